//! Response validation
//!
//! Backend text must be a JSON object with a non-empty `summary`, a known
//! `severity` and `actions` as an array of strings. Markdown code fences
//! around the object are tolerated.

use serde_json::Value as JsonValue;

use pulsecheck_core::Status;

/// A response that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSynthesis {
    pub summary: String,
    pub severity: Status,
    pub actions: Vec<String>,
}

/// Why a response was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Response failed validation: {0}")]
pub struct SchemaError(pub String);

/// Remove a surrounding ```/```json fence, if any
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Validate backend text into a `GeneratedSynthesis`
pub fn parse_synthesis(raw: &str) -> Result<GeneratedSynthesis, SchemaError> {
    let json: JsonValue = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| SchemaError(format!("not valid JSON: {}", e)))?;
    let object = json
        .as_object()
        .ok_or_else(|| SchemaError("top level is not a JSON object".to_string()))?;

    let summary = object
        .get("summary")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SchemaError("`summary` must be a non-empty string".to_string()))?;

    let severity = object
        .get("severity")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| SchemaError("`severity` must be a string".to_string()))?
        .parse::<Status>()
        .map_err(|e| SchemaError(format!("`severity`: {}", e)))?;

    let actions = object
        .get("actions")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| SchemaError("`actions` must be an array".to_string()))?
        .iter()
        .map(|a| {
            a.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| SchemaError("`actions` must contain only strings".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GeneratedSynthesis {
        summary: summary.to_string(),
        severity,
        actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_fenced_json() {
        let body = r#"{"summary": "Jobs degraded", "severity": "warning", "actions": ["rerun nightly"]}"#;
        let expected = GeneratedSynthesis {
            summary: "Jobs degraded".into(),
            severity: Status::Warning,
            actions: vec!["rerun nightly".into()],
        };
        assert_eq!(parse_synthesis(body).unwrap(), expected);
        assert_eq!(parse_synthesis(&format!("```json\n{}\n```", body)).unwrap(), expected);
        assert_eq!(parse_synthesis(&format!("```\n{}\n```", body)).unwrap(), expected);
    }

    #[test]
    fn test_rejects_schema_violations() {
        let cases = [
            "not json at all",
            r#"["summary"]"#,
            r#"{"summary": "", "severity": "warning", "actions": []}"#,
            r#"{"summary": "x", "severity": "catastrophic", "actions": []}"#,
            r#"{"summary": "x", "severity": "warning"}"#,
            r#"{"summary": "x", "severity": "warning", "actions": [1, 2]}"#,
        ];
        for case in cases {
            assert!(parse_synthesis(case).is_err(), "accepted: {}", case);
        }
    }
}
