//! studydiag-core — Feedback parsing, scoring, and longitudinal analysis.
//!
//! This crate defines the test/attempt data model, the elite score formula,
//! trend and mistake analysis, the attempt store, and the feedback pipeline
//! that ties the external text extractor and language model together.

pub mod engine;
pub mod error;
pub mod mistakes;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod scoring;
pub mod store;
pub mod traits;
pub mod trend;
