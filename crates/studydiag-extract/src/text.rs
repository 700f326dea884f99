//! Text normalization shared by the extractors.

/// Page separator emitted by `pdftotext`.
pub const PAGE_BREAK: char = '\u{000C}';

/// Collapse whitespace within each page and join non-empty pages with `\n`.
pub fn join_pages<'a, I>(pages: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    pages
        .into_iter()
        .map(collapse_whitespace)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split raw tool output into pages and normalize them.
pub fn normalize_pages(raw: &str) -> String {
    join_pages(raw.split(PAGE_BREAK))
}

/// Join whitespace-separated items with single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_joined_with_newlines() {
        let raw = "Q1  answer:\n x = 4\u{000C}Q2\tanswer: 7\u{000C}";
        assert_eq!(normalize_pages(raw), "Q1 answer: x = 4\nQ2 answer: 7");
    }

    #[test]
    fn blank_pages_dropped() {
        assert_eq!(normalize_pages("\u{000C}  \n\u{000C}only\u{000C}"), "only");
        assert_eq!(normalize_pages("   "), "");
    }
}
