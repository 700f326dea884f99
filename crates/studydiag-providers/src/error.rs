//! Provider error types.
//!
//! The enum lives in `studydiag-core` so the engine can classify failures;
//! it is re-exported here for provider implementations.

pub use studydiag_core::error::ProviderError;
