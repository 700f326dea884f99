//! Feedback prompt construction.

use crate::model::Subject;

/// System instruction sent alongside every feedback prompt.
pub const SYSTEM_PROMPT: &str = "You are an AI study diagnostician acting like a teacher marking a test. Respond ONLY with a single valid JSON object and no other text.";

const RESPONSE_SCHEMA: &str = r#"{
  "diagnosis": "...",
  "quotedMistakes": [
    { "studentQuote": "...", "issue": "...", "betterAnswer": "..." }
  ],
  "strengths": [
    { "studentQuote": "...", "whyItsGood": "..." }
  ],
  "studyPlan": ["Day 1...", "Day 2...", "Day 3..."],
  "estimatedTotalQuestions": 0,
  "answeredQuestions": 0
}"#;

/// Build the prompt for one attempt.
///
/// `questions_text` is the extracted test paper, when the student supplied it.
pub fn build_feedback_prompt(
    subject: &Subject,
    attempt_text: &str,
    questions_text: Option<&str>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are an AI study diagnostician acting like a teacher marking a test.\n\n",
    );
    prompt.push_str(&format!("The subject is {subject}.\n\n"));
    prompt.push_str("You MUST base feedback ONLY on what the student wrote. ");
    prompt.push_str(
        "Quote the student's words exactly in every studentQuote. \
         Estimate how many questions the test has and how many the student answered.\n\n",
    );
    prompt.push_str("Respond ONLY in valid JSON:\n\n");
    prompt.push_str(RESPONSE_SCHEMA);
    prompt.push_str("\n\n");

    if let Some(questions) = questions_text.map(str::trim).filter(|q| !q.is_empty()) {
        prompt.push_str("Test questions:\n");
        prompt.push_str(questions);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Student work:\n");
    prompt.push_str(attempt_text);
    prompt.push('\n');
    prompt
}
