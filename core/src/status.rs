//! Health status
//!
//! Source-local and platform-wide severity. Ordering is significant:
//! `Healthy < Warning < Critical`, so the most severe of a set is its `max`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a source or of the whole platform
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Healthy,
    Warning,
    Critical,
}

impl Status {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Healthy => "healthy",
            Status::Warning => "warning",
            Status::Critical => "critical",
        }
    }

    /// Most severe status of an iterator, `Healthy` when empty
    pub fn worst<I: IntoIterator<Item = Status>>(statuses: I) -> Status {
        statuses.into_iter().max().unwrap_or(Status::Healthy)
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Status::Healthy)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognised status names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "healthy" => Ok(Status::Healthy),
            "warning" => Ok(Status::Warning),
            "critical" => Ok(Status::Critical),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_by_severity() {
        assert!(Status::Healthy < Status::Warning);
        assert!(Status::Warning < Status::Critical);
        assert_eq!(
            Status::worst([Status::Warning, Status::Healthy, Status::Critical]),
            Status::Critical
        );
        assert_eq!(Status::worst(Vec::new()), Status::Healthy);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("CRITICAL".parse::<Status>().unwrap(), Status::Critical);
        assert_eq!(" warning ".parse::<Status>().unwrap(), Status::Warning);
        assert!("error".parse::<Status>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Status::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        let parsed: Status = serde_json::from_str("\"healthy\"").unwrap();
        assert_eq!(parsed, Status::Healthy);
    }
}
