//! The `studydiag analyze` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use studydiag_core::engine::{
    AnalyzeRequest, FeedbackEngine, GeneratedAttempt, ProgressReporter, Stage,
};
use studydiag_core::error::FeedbackError;
use studydiag_core::traits::{Document, LlmProvider};
use studydiag_extract::ExtensionRouter;
use studydiag_providers::create_provider;

use super::{find_test, open_store, show, Paths};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_start(&self, test_id: Uuid) {
        eprintln!("Analyzing attempt for test {test_id}...");
    }

    fn on_stage(&self, stage: Stage) {
        let label = match stage {
            Stage::Extracting => "extracting text",
            Stage::Generating => "asking the model for feedback",
            Stage::Parsing => "reading feedback",
            Stage::Saving => "scoring and saving",
        };
        eprintln!("  {label}");
    }

    fn on_complete(&self, generated: &GeneratedAttempt) {
        eprintln!(
            "  done in {:.1}s ({} tokens)",
            generated.duration_ms as f64 / 1000.0,
            generated.token_usage.total_tokens
        );
    }

    fn on_error(&self, error: &FeedbackError) {
        if let Some(retry) = error.provider_error().and_then(|e| e.retry_after_ms()) {
            eprintln!("  rate limited; try again in {}s", retry / 1000);
        }
    }
}

pub async fn execute(
    paths: &Paths,
    test: String,
    attempt_file: PathBuf,
    questions_file: Option<PathBuf>,
) -> Result<()> {
    let config = paths.load_config()?;
    let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config)?);

    let store = Arc::new(open_store(&config)?);
    let test = find_test(&store, &test)?;

    let attempt = Document::read(&attempt_file)?;
    let questions = questions_file.as_deref().map(Document::read).transpose()?;

    let engine = FeedbackEngine::new(
        provider,
        Arc::new(ExtensionRouter::default()),
        Arc::clone(&store),
        config.engine_config(),
    );

    let generated = engine
        .generate(
            AnalyzeRequest {
                test_id: test.id,
                attempt: Some(attempt),
                questions,
            },
            &ConsoleReporter,
        )
        .await?;

    for warning in &generated.warnings {
        eprintln!("Warning: {}", warning.message);
    }

    let updated = store
        .get(test.id)
        .ok_or(FeedbackError::TestNotFound(test.id))?;
    show::print_attempt(&updated, generated.index);
    println!(
        "\nScore breakdown: accuracy {:.0}%, completion {:.0}%, growth {:+.0}%, fixed {}, repeated {}",
        generated.breakdown.accuracy * 100.0,
        generated.breakdown.completion * 100.0,
        generated.breakdown.growth * 100.0,
        generated.breakdown.fixed,
        generated.breakdown.repeated,
    );
    Ok(())
}
