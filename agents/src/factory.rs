//! Generator Factory
//!
//! Creates the generation backend from analyzer settings.

use std::sync::Arc;
use tracing::{info, warn};

use pulsecheck_core::{AnalyzerSettings, HttpTransport};

use crate::anthropic::AnthropicGenerator;
use crate::generator::Generator;
use crate::stub::StubGenerator;

/// Provider names accepted in `[analyzer] provider`
pub const KNOWN_PROVIDERS: &[&str] = &["anthropic", "none", "stub"];

/// Factory errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown analyzer provider: {0}")]
    UnknownProvider(String),
}

/// Create the configured generator; `None` means rule-based synthesis only
///
/// A missing API key is not an error: the run proceeds with the fallback.
pub fn create_generator(
    settings: &AnalyzerSettings,
    transport: Arc<dyn HttpTransport>,
) -> Result<Option<Arc<dyn Generator>>, FactoryError> {
    match settings.provider.as_str() {
        "none" => {
            info!("Analyzer provider disabled; rule-based synthesis only");
            Ok(None)
        }
        "stub" => Ok(Some(Arc::new(StubGenerator::default()))),
        "anthropic" => {
            let Some(api_key) = settings.api_key.clone().filter(|k| !k.trim().is_empty()) else {
                warn!("No API key for analyzer provider 'anthropic'; rule-based synthesis only");
                return Ok(None);
            };
            Ok(Some(Arc::new(AnthropicGenerator::with_transport(
                settings.base_url.clone(),
                settings.model.clone(),
                api_key,
                settings.request_timeout(),
                transport,
            ))))
        }
        other => Err(FactoryError::UnknownProvider(other.to_string())),
    }
}
