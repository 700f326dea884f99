//! Core data model types for studydiag.
//!
//! Tests own an append-only log of attempts; each attempt carries the
//! feedback parsed from the model and the score computed for it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Subject a test belongs to.
///
/// The four named subjects are the ones offered by default; any other
/// non-empty name is accepted as `Other`. Names compare case-insensitively,
/// matching how the named subjects parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subject {
    Math,
    Science,
    Accounting,
    Programming,
    Other(String),
}

impl Subject {
    /// The subjects offered when creating a test.
    pub const DEFAULTS: [Subject; 4] = [
        Subject::Math,
        Subject::Science,
        Subject::Accounting,
        Subject::Programming,
    ];
}

impl PartialEq for Subject {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Subject::Other(a), Subject::Other(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

impl Eq for Subject {}

impl Hash for Subject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        if let Subject::Other(name) = self {
            name.to_lowercase().hash(state);
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Math => write!(f, "Math"),
            Subject::Science => write!(f, "Science"),
            Subject::Accounting => write!(f, "Accounting"),
            Subject::Programming => write!(f, "Programming"),
            Subject::Other(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Err("subject must not be empty".to_string()),
            "math" | "maths" | "mathematics" => Ok(Subject::Math),
            "science" => Ok(Subject::Science),
            "accounting" => Ok(Subject::Accounting),
            "programming" => Ok(Subject::Programming),
            _ => Ok(Subject::Other(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for Subject {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.to_string()
    }
}

/// A quoted piece of the student's work the model judged to be wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedMistake {
    /// Verbatim quote from the student's answer.
    #[serde(default)]
    pub student_quote: String,
    /// What is wrong with it.
    #[serde(default)]
    pub issue: String,
    /// A corrected answer.
    #[serde(default)]
    pub better_answer: String,
}

/// A quoted piece of the student's work the model judged to be good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strength {
    #[serde(default)]
    pub student_quote: String,
    #[serde(default)]
    pub why_its_good: String,
}

/// Structured diagnostic feedback for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// Free-text diagnosis.
    #[serde(default)]
    pub diagnosis: String,
    /// Mistakes, each quoting the student.
    pub quoted_mistakes: Vec<QuotedMistake>,
    /// Strengths, each quoting the student.
    pub strengths: Vec<Strength>,
    /// Ordered study plan steps.
    pub study_plan: Vec<String>,
    /// How many questions the model believes the test has.
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_total_questions: Option<u32>,
    /// How many of them the student answered.
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub answered_questions: Option<u32>,
}

impl Feedback {
    /// Quote text of every mistake, in order.
    pub fn mistake_quotes(&self) -> Vec<&str> {
        self.quoted_mistakes
            .iter()
            .map(|m| m.student_quote.as_str())
            .collect()
    }
}

/// Accept integers, floats, and numeric strings; anything negative,
/// non-finite, or non-numeric reads as absent.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let number = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round().min(u32::MAX as f64) as u32))
}

/// One scored submission against a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// Name of the uploaded answers document.
    #[serde(alias = "pdfName")]
    pub source_name: String,
    /// Parsed feedback.
    pub feedback: Feedback,
    /// Copy of the parent test's subject.
    pub subject: Subject,
    /// Elite score, 0–100.
    pub score: u32,
    /// Local wall-clock creation time.
    pub timestamp: DateTime<Local>,
}

impl Attempt {
    /// Create an attempt stamped with the current local time.
    pub fn new(source_name: impl Into<String>, feedback: Feedback, subject: Subject, score: u32) -> Self {
        Self {
            source_name: source_name.into(),
            feedback,
            subject,
            score,
            timestamp: Local::now(),
        }
    }
}

/// Append-only, creation-ordered sequence of attempts.
///
/// The last element is always the latest attempt and the one before it the
/// previous one. Only the store can push or remove entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog(Vec<Attempt>);

impl AttemptLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Attempt> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Attempt] {
        &self.0
    }

    /// The most recently appended attempt.
    pub fn latest(&self) -> Option<&Attempt> {
        self.0.last()
    }

    /// The attempt immediately before the latest one.
    pub fn previous(&self) -> Option<&Attempt> {
        self.0.len().checked_sub(2).and_then(|i| self.0.get(i))
    }

    pub(crate) fn push(&mut self, attempt: Attempt) -> usize {
        self.0.push(attempt);
        self.0.len() - 1
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<Attempt> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }
}

impl FromIterator<Attempt> for AttemptLog {
    fn from_iter<I: IntoIterator<Item = Attempt>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AttemptLog {
    type Item = &'a Attempt;
    type IntoIter = std::slice::Iter<'a, Attempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A named, subject-tagged container for one exam's repeated attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Subject of the test.
    pub subject: Subject,
    #[serde(default)]
    attempts: AttemptLog,
}

impl Test {
    /// Create an empty test with a fresh identifier.
    pub fn new(name: impl Into<String>, subject: Subject) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            subject,
            attempts: AttemptLog::new(),
        }
    }

    pub fn attempts(&self) -> &AttemptLog {
        &self.attempts
    }

    pub(crate) fn attempts_mut(&mut self) -> &mut AttemptLog {
        &mut self.attempts
    }

    /// Resolve a possibly stale selected index.
    ///
    /// Returns the selected attempt while the index is still in range, and
    /// the latest attempt otherwise (including when nothing is selected).
    pub fn resolve_selection(&self, selected: Option<usize>) -> Option<(usize, &Attempt)> {
        match selected {
            Some(i) if i < self.attempts.len() => self.attempts.get(i).map(|a| (i, a)),
            _ => {
                let last = self.attempts.len().checked_sub(1)?;
                self.attempts.latest().map(|a| (last, a))
            }
        }
    }
}
