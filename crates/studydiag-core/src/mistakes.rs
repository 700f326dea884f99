//! Repeated-mistake aggregation across a test's attempts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::Attempt;

/// A mistake quote seen more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedMistake {
    /// Lower-cased quote text.
    pub quote: String,
    /// Occurrences across all attempts.
    pub count: usize,
}

/// Count mistake quotes across `attempts` case-insensitively and return the
/// ones seen more than once, in first-seen order.
///
/// Matching here ignores case, unlike the exact matching used for scoring
/// and improvement summaries.
pub fn repeated_mistakes<'a, I>(attempts: I) -> Vec<RepeatedMistake>
where
    I: IntoIterator<Item = &'a Attempt>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<RepeatedMistake> = Vec::new();

    for attempt in attempts {
        for mistake in &attempt.feedback.quoted_mistakes {
            let key = mistake.student_quote.to_lowercase();
            match index.get(&key) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(key.clone(), counts.len());
                    counts.push(RepeatedMistake {
                        quote: key,
                        count: 1,
                    });
                }
            }
        }
    }

    counts.retain(|m| m.count > 1);
    counts
}
