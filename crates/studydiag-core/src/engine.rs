//! Feedback pipeline orchestrator.
//!
//! Runs one "generate feedback" operation: extract text, prompt the model,
//! parse and score the feedback, and append the attempt to its test. Nothing
//! is stored unless every step succeeds.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::error::FeedbackError;
use crate::model::{Attempt, Feedback};
use crate::parser::{parse_feedback, validate_feedback, ValidationWarning};
use crate::prompt::{build_feedback_prompt, SYSTEM_PROMPT};
use crate::scoring::ScoreBreakdown;
use crate::store::TestStore;
use crate::traits::{Document, GenerateRequest, LlmProvider, TextExtractor, TokenUsage};

/// Configuration for the feedback engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Max tokens for generation.
    pub max_tokens: u32,
    /// Optional system prompt override.
    pub system_prompt_override: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
            temperature: 0.0,
            max_tokens: 8192,
            system_prompt_override: None,
        }
    }
}

/// One request to analyze an attempt document.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// Test the attempt belongs to.
    pub test_id: Uuid,
    /// The student's answers. Required.
    pub attempt: Option<Document>,
    /// The test paper, sent to the model as context when present.
    pub questions: Option<Document>,
}

/// Pipeline step, reported while a generation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Generating,
    Parsing,
    Saving,
}

/// Progress reporting trait.
///
/// `on_start` is always followed by exactly one of `on_complete` or
/// `on_error`.
pub trait ProgressReporter: Send + Sync {
    fn on_start(&self, test_id: Uuid);
    fn on_stage(&self, stage: Stage);
    fn on_complete(&self, generated: &GeneratedAttempt);
    fn on_error(&self, error: &FeedbackError);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_start(&self, _: Uuid) {}
    fn on_stage(&self, _: Stage) {}
    fn on_complete(&self, _: &GeneratedAttempt) {}
    fn on_error(&self, _: &FeedbackError) {}
}

/// A successfully generated and stored attempt.
#[derive(Debug, Clone)]
pub struct GeneratedAttempt {
    pub test_id: Uuid,
    /// Position of the attempt in its test.
    pub index: usize,
    pub attempt: Attempt,
    pub breakdown: ScoreBreakdown,
    /// Non-fatal issues found in the model output.
    pub warnings: Vec<ValidationWarning>,
    pub token_usage: TokenUsage,
    /// Wall-clock duration of the whole pipeline.
    pub duration_ms: u64,
}

/// The feedback engine.
pub struct FeedbackEngine {
    provider: Arc<dyn LlmProvider>,
    extractor: Arc<dyn TextExtractor>,
    store: Arc<TestStore>,
    config: EngineConfig,
}

impl FeedbackEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        extractor: Arc<dyn TextExtractor>,
        store: Arc<TestStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            extractor,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<TestStore> {
        &self.store
    }

    /// Generate feedback for one attempt and append it to its test.
    pub async fn generate(
        &self,
        request: AnalyzeRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<GeneratedAttempt, FeedbackError> {
        let test_id = request.test_id;
        progress.on_start(test_id);

        match self.run(request, progress).await {
            Ok(generated) => {
                tracing::info!(
                    test_id = %test_id,
                    index = generated.index,
                    score = generated.attempt.score,
                    duration_ms = generated.duration_ms,
                    "attempt stored"
                );
                progress.on_complete(&generated);
                Ok(generated)
            }
            Err(e) => {
                tracing::error!(test_id = %test_id, kind = e.kind(), "feedback generation failed: {e}");
                progress.on_error(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: AnalyzeRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<GeneratedAttempt, FeedbackError> {
        let start = Instant::now();
        let test_id = request.test_id;

        let document = match request.attempt {
            Some(doc) if doc.name.trim().is_empty() => {
                return Err(FeedbackError::MissingInput("attempt document name".into()))
            }
            Some(doc) if doc.bytes.is_empty() => {
                return Err(FeedbackError::MissingInput(format!(
                    "attempt document {} is empty",
                    doc.name
                )))
            }
            Some(doc) => doc,
            None => return Err(FeedbackError::MissingInput("attempt document".into())),
        };

        let test = self
            .store
            .get(test_id)
            .ok_or(FeedbackError::TestNotFound(test_id))?;

        let lock = self.store.test_lock(test_id);
        let _guard = lock.lock().await;

        progress.on_stage(Stage::Extracting);
        let attempt_text = self
            .extractor
            .extract(&document)
            .await
            .map_err(FeedbackError::Extraction)?;
        let questions_text = match &request.questions {
            Some(questions) => Some(
                self.extractor
                    .extract(questions)
                    .await
                    .map_err(FeedbackError::Extraction)?,
            ),
            None => None,
        };
        tracing::debug!(
            chars = attempt_text.len(),
            document = %document.name,
            "attempt text extracted"
        );

        progress.on_stage(Stage::Generating);
        let prompt = build_feedback_prompt(&test.subject, &attempt_text, questions_text.as_deref());
        let response = self
            .provider
            .generate(&GenerateRequest {
                model: self.config.model.clone(),
                prompt,
                system_prompt: Some(
                    self.config
                        .system_prompt_override
                        .clone()
                        .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
                ),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            })
            .await
            .map_err(FeedbackError::ModelService)?;
        tracing::debug!(
            provider = self.provider.name(),
            model = %response.model,
            latency_ms = response.latency_ms,
            "model responded"
        );

        progress.on_stage(Stage::Parsing);
        let feedback = parse_feedback(&response.content)?;
        let warnings = validate_feedback(&feedback);
        for w in &warnings {
            tracing::warn!(field = w.field, "model output: {}", w.message);
        }

        progress.on_stage(Stage::Saving);
        let source_name = document.name;
        let store = Arc::clone(&self.store);
        // The store does blocking file I/O under its locks.
        let (index, attempt, breakdown) = tokio::task::spawn_blocking(move || {
            store.append_scored(test_id, |test| score_attempt(source_name, feedback, test))
        })
        .await
        .map_err(|e| FeedbackError::Storage(anyhow::anyhow!("store task failed: {e}")))??;

        Ok(GeneratedAttempt {
            test_id,
            index,
            attempt,
            breakdown,
            warnings,
            token_usage: response.token_usage,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn score_attempt(
    source_name: String,
    feedback: Feedback,
    test: &crate::model::Test,
) -> (Attempt, ScoreBreakdown) {
    let breakdown = ScoreBreakdown::compute(&feedback, test.attempts().as_slice());
    let attempt = Attempt::new(source_name, feedback, test.subject.clone(), breakdown.score);
    (attempt, breakdown)
}
