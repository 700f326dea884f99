//! PDF text extraction via the poppler `pdftotext` tool.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use studydiag_core::traits::{Document, TextExtractor};

use crate::scratch::ScratchFile;
use crate::text::normalize_pages;

const DEFAULT_PROGRAM: &str = "pdftotext";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Extracts text from PDF documents by running `pdftotext`.
pub struct PdfTextExtractor {
    program: OsString,
    leading_args: Vec<OsString>,
    timeout: Duration,
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_PROGRAM.into(),
            leading_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a different program, with `leading_args` placed before the
    /// `pdftotext` arguments.
    pub fn with_command(
        mut self,
        program: impl Into<OsString>,
        leading_args: Vec<OsString>,
    ) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    async fn run_tool(&self, scratch: &ScratchFile) -> Result<String> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("-enc")
            .arg("UTF-8")
            .arg(scratch.path())
            .arg("-")
            .current_dir(scratch.dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .with_context(|| format!("pdftotext timed out after {}s", self.timeout.as_secs_f64()))?
            .with_context(|| {
                format!(
                    "failed to run {}; is poppler-utils installed?",
                    self.program.to_string_lossy()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "pdftotext exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        tracing::debug!(
            bytes = output.stdout.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "pdftotext finished"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, document: &Document) -> Result<String> {
        anyhow::ensure!(
            document.bytes.starts_with(PDF_MAGIC),
            "{} is not a PDF document",
            document.name
        );

        let scratch = ScratchFile::write(&document.name, &document.bytes)?;
        let raw = self.run_tool(&scratch).await?;
        let text = normalize_pages(&raw);
        anyhow::ensure!(
            !text.is_empty(),
            "no text could be extracted from {} (scanned pages need OCR first)",
            document.name
        );
        Ok(text)
    }
}
