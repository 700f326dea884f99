//! studydiag-extract — Document text extraction.
//!
//! Turns uploaded attempt and question documents into plain text for the
//! feedback prompt. PDFs go through `pdftotext`; text and Markdown files are
//! read directly.

pub mod pdf;
pub mod plain;
pub mod scratch;
pub mod text;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use studydiag_core::traits::{Document, TextExtractor};

pub use pdf::PdfTextExtractor;
pub use plain::PlainTextExtractor;

/// Dispatches documents to an extractor by file extension.
///
/// Files without an extension are sniffed for the PDF header.
pub struct ExtensionRouter {
    routes: Vec<(Vec<&'static str>, Arc<dyn TextExtractor>)>,
}

impl Default for ExtensionRouter {
    fn default() -> Self {
        Self::new()
            .route(&["pdf"], Arc::new(PdfTextExtractor::new()))
            .route(&["txt", "text", "md", "markdown"], Arc::new(PlainTextExtractor))
    }
}

impl ExtensionRouter {
    /// A router with no routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Send documents with any of `extensions` (lower-case) to `extractor`.
    /// Later routes take precedence.
    pub fn route(mut self, extensions: &[&'static str], extractor: Arc<dyn TextExtractor>) -> Self {
        self.routes.insert(0, (extensions.to_vec(), extractor));
        self
    }

    fn resolve(&self, document: &Document) -> Result<&Arc<dyn TextExtractor>> {
        let extension = document.extension().or_else(|| {
            document
                .bytes
                .starts_with(b"%PDF-")
                .then(|| "pdf".to_string())
        });
        let Some(extension) = extension else {
            anyhow::bail!("cannot tell the document type of {}", document.name);
        };
        self.routes
            .iter()
            .find(|(exts, _)| exts.contains(&extension.as_str()))
            .map(|(_, extractor)| extractor)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unsupported document type .{extension} ({})",
                    document.name
                )
            })
    }
}

#[async_trait]
impl TextExtractor for ExtensionRouter {
    async fn extract(&self, document: &Document) -> Result<String> {
        let extractor = self.resolve(document)?;
        tracing::debug!(document = %document.name, "extracting text");
        extractor.extract(document).await
    }
}
