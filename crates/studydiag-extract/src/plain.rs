//! Plain-text and Markdown documents.

use anyhow::{Context, Result};
use async_trait::async_trait;

use studydiag_core::traits::{Document, TextExtractor};

use crate::text::{collapse_whitespace, PAGE_BREAK};

/// Reads UTF-8 text documents.
///
/// Each non-blank line is kept as its own line with whitespace collapsed;
/// form feeds count as line breaks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, document: &Document) -> Result<String> {
        let text = std::str::from_utf8(&document.bytes)
            .with_context(|| format!("{} is not valid UTF-8 text", document.name))?;
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

        let lines: Vec<String> = text
            .split(|c: char| c == '\n' || c == PAGE_BREAK)
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect();
        anyhow::ensure!(!lines.is_empty(), "{} contains no text", document.name);
        Ok(lines.join("\n"))
    }
}
