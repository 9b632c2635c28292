//! Pulsecheck Agents Module
//!
//! The analysis stage: builds a prompt from the health snapshot, calls a
//! text-generation backend with retries, validates and reconciles its answer,
//! and falls back to a rule-based synthesis when the backend cannot help.

pub mod analyzer;
pub mod anthropic;
pub mod factory;
pub mod fallback;
pub mod generator;
pub mod prompt;
pub mod response;
pub mod retry;
pub mod stub;

pub use analyzer::{reconcile, Analyzer, AttemptError};
pub use anthropic::AnthropicGenerator;
pub use factory::{create_generator, FactoryError, KNOWN_PROVIDERS};
pub use fallback::fallback_synthesis;
pub use generator::{GenerationError, GenerationRequest, Generator};
pub use response::{parse_synthesis, GeneratedSynthesis, SchemaError};
pub use retry::RetryPolicy;
pub use stub::StubGenerator;
