//! studydiag-providers — language-model provider integrations.
//!
//! Implements the `LlmProvider` trait for Google Gemini, plus a scripted
//! mock for tests, and loads the studydiag configuration file.

pub mod config;
pub mod error;
pub mod gemini;
pub mod mock;

pub use config::{create_provider, load_config, load_config_from, GeminiConfig, StudydiagConfig};
pub use error::ProviderError;
