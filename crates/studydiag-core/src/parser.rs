//! Model output parser.
//!
//! Strips Markdown code fences from raw model output, parses the remaining
//! JSON into [`Feedback`], and validates it for common issues.

use std::collections::HashSet;

use crate::error::FeedbackError;
use crate::model::Feedback;

/// Extract the JSON payload from markdown-formatted model output.
///
/// Handles:
/// - One or more ```json blocks (the first one wins)
/// - Untagged ``` blocks (if no json-tagged block is found)
/// - Truncated blocks with no closing fence
/// - Inline fences that are not on their own line (markers are removed)
/// - Raw JSON with no fences (returned trimmed)
pub fn strip_code_fences(response: &str) -> String {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            // "```json {..." is an inline fence, not a block opener
            if !lang.is_empty() && lang.contains(|c: char| !c.is_ascii_alphanumeric()) {
                continue;
            }
            in_block = true;
            is_json_block = lang == "json" || lang == "jsonc";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else if is_generic_block {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    if in_block && !current_block.is_empty() {
        if is_json_block {
            json_blocks.push(current_block);
        } else if is_generic_block {
            generic_blocks.push(current_block);
        }
    }

    if let Some(block) = json_blocks.into_iter().next() {
        return block.trim().to_string();
    }

    if let Some(block) = generic_blocks.into_iter().next() {
        return block.trim().to_string();
    }

    response
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse raw model output into [`Feedback`].
///
/// Fails with [`FeedbackError::Parse`] when the stripped text is not JSON or
/// lacks one of the required arrays.
pub fn parse_feedback(raw: &str) -> Result<Feedback, FeedbackError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(FeedbackError::Parse("model output is empty".into()));
    }
    serde_json::from_str(&cleaned).map_err(|e| FeedbackError::Parse(e.to_string()))
}

/// A warning from feedback validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// Field the warning concerns, in the model's naming.
    pub field: &'static str,
    /// Warning message.
    pub message: String,
}

/// Validate parsed feedback for common model mistakes.
pub fn validate_feedback(feedback: &Feedback) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if let (Some(total), Some(answered)) = (
        feedback.estimated_total_questions,
        feedback.answered_questions,
    ) {
        if answered > total {
            warnings.push(ValidationWarning {
                field: "answeredQuestions",
                message: format!("{answered} answered exceeds {total} estimated total"),
            });
        }
    }

    if feedback.study_plan.is_empty() {
        warnings.push(ValidationWarning {
            field: "studyPlan",
            message: "study plan is empty".into(),
        });
    }

    let empty_mistakes = feedback
        .quoted_mistakes
        .iter()
        .filter(|m| m.student_quote.trim().is_empty())
        .count();
    if empty_mistakes > 0 {
        warnings.push(ValidationWarning {
            field: "quotedMistakes",
            message: format!("{empty_mistakes} mistake(s) have an empty studentQuote"),
        });
    }

    let empty_strengths = feedback
        .strengths
        .iter()
        .filter(|s| s.student_quote.trim().is_empty())
        .count();
    if empty_strengths > 0 {
        warnings.push(ValidationWarning {
            field: "strengths",
            message: format!("{empty_strengths} strength(s) have an empty studentQuote"),
        });
    }

    let strength_quotes: HashSet<&str> = feedback
        .strengths
        .iter()
        .map(|s| s.student_quote.as_str())
        .filter(|q| !q.trim().is_empty())
        .collect();
    for mistake in &feedback.quoted_mistakes {
        if strength_quotes.contains(mistake.student_quote.as_str()) {
            warnings.push(ValidationWarning {
                field: "quotedMistakes",
                message: format!(
                    "\"{}\" is listed as both a mistake and a strength",
                    mistake.student_quote
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEEDBACK_JSON: &str = r#"{
  "diagnosis": "Solid algebra, weak on fractions.",
  "quotedMistakes": [
    { "studentQuote": "1/2 + 1/3 = 2/5", "issue": "Added denominators", "betterAnswer": "5/6" }
  ],
  "strengths": [
    { "studentQuote": "x = 4", "whyItsGood": "Correct isolation of x" }
  ],
  "studyPlan": ["Day 1: common denominators", "Day 2: mixed practice"],
  "estimatedTotalQuestions": 5,
  "answeredQuestions": 4
}"#;

    #[test]
    fn parse_raw_json() {
        let feedback = parse_feedback(FEEDBACK_JSON).unwrap();
        assert_eq!(feedback.quoted_mistakes.len(), 1);
        assert_eq!(feedback.strengths[0].student_quote, "x = 4");
        assert_eq!(feedback.study_plan.len(), 2);
        assert_eq!(feedback.estimated_total_questions, Some(5));
        assert_eq!(feedback.answered_questions, Some(4));
    }

    #[test]
    fn parse_json_fenced_block() {
        let raw = format!("Here is the feedback:\n\n```json\n{FEEDBACK_JSON}\n```\n\nGood luck!");
        let feedback = parse_feedback(&raw).unwrap();
        assert_eq!(feedback.diagnosis, "Solid algebra, weak on fractions.");
    }

    #[test]
    fn parse_generic_fenced_block() {
        let raw = format!("```\n{FEEDBACK_JSON}\n```");
        assert!(parse_feedback(&raw).is_ok());
    }

    #[test]
    fn parse_inline_fences() {
        let raw = r#"```json{"diagnosis":"d","quotedMistakes":[],"strengths":[],"studyPlan":[]}```"#;
        let feedback = parse_feedback(raw).unwrap();
        assert_eq!(feedback.diagnosis, "d");
    }

    #[test]
    fn strip_prefers_json_block() {
        let raw = "```\nnot this\n```\n\n```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn strip_truncated_block() {
        let raw = "```json\n{\"a\": 1}";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn strip_ignores_other_languages() {
        let raw = "```python\nprint(1)\n```\n\n{\"a\": 1}";
        // No json or untagged block: fall back to marker removal of the raw text.
        assert!(strip_code_fences(raw).ends_with("{\"a\": 1}"));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_feedback("I could not read this document.").unwrap_err();
        assert!(matches!(err, FeedbackError::Parse(_)));
    }

    #[test]
    fn empty_output_is_parse_error() {
        let err = parse_feedback("```json\n```").unwrap_err();
        assert!(matches!(err, FeedbackError::Parse(_)));
    }

    #[test]
    fn missing_required_array_is_parse_error() {
        let raw = r#"{"diagnosis": "d", "strengths": [], "studyPlan": []}"#;
        let err = parse_feedback(raw).unwrap_err();
        match err {
            FeedbackError::Parse(msg) => assert!(msg.contains("quotedMistakes"), "{msg}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn validate_clean_feedback() {
        let feedback = parse_feedback(FEEDBACK_JSON).unwrap();
        assert!(validate_feedback(&feedback).is_empty());
    }

    #[test]
    fn validate_flags_common_issues() {
        let raw = r#"{
            "quotedMistakes": [{"studentQuote": "x = 4"}, {"studentQuote": " "}],
            "strengths": [{"studentQuote": "x = 4"}],
            "studyPlan": [],
            "estimatedTotalQuestions": 3,
            "answeredQuestions": 5
        }"#;
        let feedback = parse_feedback(raw).unwrap();
        let warnings = validate_feedback(&feedback);
        assert!(warnings.iter().any(|w| w.field == "answeredQuestions"));
        assert!(warnings.iter().any(|w| w.field == "studyPlan"));
        assert!(warnings.iter().any(|w| w.message.contains("empty studentQuote")));
        assert!(warnings.iter().any(|w| w.message.contains("both a mistake")));
    }
}
