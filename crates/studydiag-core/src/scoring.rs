//! Elite score computation.
//!
//! The score blends accuracy (50%), completion (20%), and improvement over
//! the previous attempt (growth 15%, plus a learning bonus and momentum).

use serde::{Deserialize, Serialize};

use crate::model::{Attempt, Feedback};

const ACCURACY_WEIGHT: f64 = 0.5;
const COMPLETION_WEIGHT: f64 = 0.2;
const GROWTH_WEIGHT: f64 = 0.15;
const FIXED_BONUS: f64 = 0.1;
const REPEATED_PENALTY: f64 = 0.05;
const MOMENTUM_BONUS: f64 = 0.05;

/// Every intermediate term of an elite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// strengths / max(strengths + mistakes, 1).
    pub accuracy: f64,
    /// answered / total questions. Not clamped; may exceed 1.
    pub completion: f64,
    /// Accuracy change versus the previous attempt, in [-1, 1].
    pub growth: f64,
    /// Previous mistakes no longer present.
    pub fixed: usize,
    /// Current mistakes that were also present previously.
    pub repeated: usize,
    /// fixed × 0.1 − repeated × 0.05.
    pub learning_bonus: f64,
    /// 0.05 when growth is positive.
    pub momentum: f64,
    /// Weighted sum × 100 before clamping.
    pub raw: f64,
    /// Clamped, rounded final score.
    pub score: u32,
}

impl ScoreBreakdown {
    /// Compute the breakdown for `feedback` given the prior attempts of the
    /// same test, oldest first, excluding the attempt being scored.
    pub fn compute(feedback: &Feedback, history: &[Attempt]) -> Self {
        let accuracy = accuracy(feedback);
        let completion = completion(feedback);

        let (growth, fixed, repeated) = match history.last() {
            Some(previous) => {
                let growth = accuracy - self::accuracy(&previous.feedback);
                let (fixed, repeated) = fixed_and_repeated(&previous.feedback, feedback);
                (growth, fixed, repeated)
            }
            None => (0.0, 0, 0),
        };

        let (learning_bonus, momentum) = if history.is_empty() {
            (0.0, 0.0)
        } else {
            (
                fixed as f64 * FIXED_BONUS - repeated as f64 * REPEATED_PENALTY,
                if growth > 0.0 { MOMENTUM_BONUS } else { 0.0 },
            )
        };

        let raw = 100.0
            * (accuracy * ACCURACY_WEIGHT
                + completion * COMPLETION_WEIGHT
                + growth * GROWTH_WEIGHT
                + learning_bonus
                + momentum);

        Self {
            accuracy,
            completion,
            growth,
            fixed,
            repeated,
            learning_bonus,
            momentum,
            raw,
            score: clamp_round(raw),
        }
    }
}

/// Compute the elite score (0–100) for a new attempt.
pub fn elite_score(feedback: &Feedback, history: &[Attempt]) -> u32 {
    ScoreBreakdown::compute(feedback, history).score
}

/// Share of judged items that were strengths. Zero when nothing was judged.
pub fn accuracy(feedback: &Feedback) -> f64 {
    let strengths = feedback.strengths.len();
    let judged = strengths + feedback.quoted_mistakes.len();
    strengths as f64 / judged.max(1) as f64
}

/// Answered over total questions, falling back to the judged item count
/// when the model omitted a figure (zero counts as omitted).
pub fn completion(feedback: &Feedback) -> f64 {
    let judged = (feedback.strengths.len() + feedback.quoted_mistakes.len()) as u64;
    let total = feedback
        .estimated_total_questions
        .filter(|&n| n > 0)
        .map(u64::from)
        .unwrap_or_else(|| judged.max(1));
    let answered = feedback
        .answered_questions
        .filter(|&n| n > 0)
        .map(u64::from)
        .unwrap_or(judged);
    answered as f64 / total.max(1) as f64
}

/// Count previous quotes absent from the current attempt and current quotes
/// already present previously. Exact, case-sensitive matching.
fn fixed_and_repeated(previous: &Feedback, current: &Feedback) -> (usize, usize) {
    let prev = previous.mistake_quotes();
    let curr = current.mistake_quotes();
    let fixed = prev.iter().filter(|q| !curr.contains(q)).count();
    let repeated = curr.iter().filter(|q| prev.contains(q)).count();
    (fixed, repeated)
}

/// Clamp to [0, 100] and round half up.
fn clamp_round(raw: f64) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    (raw.clamp(0.0, 100.0) + 0.5).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{attempt, feedback};

    #[test]
    fn first_attempt_half_accuracy() {
        let fb = feedback(&["s1", "s2"], &["m1", "m2"]);
        let b = ScoreBreakdown::compute(&fb, &[]);
        assert!((b.accuracy - 0.5).abs() < f64::EPSILON);
        assert!((b.completion - 1.0).abs() < f64::EPSILON);
        assert_eq!(b.growth, 0.0);
        assert_eq!(b.learning_bonus, 0.0);
        assert_eq!(b.momentum, 0.0);
        assert_eq!(b.score, 45);
    }

    #[test]
    fn second_attempt_fixes_everything() {
        let history = vec![attempt(45, &["s1", "s2"], &["m1", "m2"])];
        let fb = feedback(&["s1", "s2", "s3"], &["m3"]);
        let b = ScoreBreakdown::compute(&fb, &history);
        assert!((b.accuracy - 0.75).abs() < f64::EPSILON);
        assert!((b.growth - 0.25).abs() < f64::EPSILON);
        assert_eq!(b.fixed, 2);
        assert_eq!(b.repeated, 0);
        assert!((b.learning_bonus - 0.2).abs() < 1e-12);
        assert_eq!(b.momentum, 0.05);
        assert!((b.raw - 86.25).abs() < 1e-9);
        assert_eq!(b.score, 86);
    }

    #[test]
    fn only_the_immediately_previous_attempt_counts() {
        let history = vec![
            attempt(100, &["a", "b", "c", "d"], &[]),
            attempt(10, &[], &["m1", "m2"]),
        ];
        let fb = feedback(&["s1"], &["m1"]);
        let b = ScoreBreakdown::compute(&fb, &history);
        assert!((b.growth - 0.5).abs() < f64::EPSILON);
        assert_eq!(b.fixed, 1);
        assert_eq!(b.repeated, 1);
        assert!((b.learning_bonus - 0.05).abs() < 1e-12);
    }

    #[test]
    fn repeated_matching_is_case_sensitive() {
        let history = vec![attempt(50, &["s"], &["Two plus two is five"])];
        let fb = feedback(&["s"], &["two plus two is five"]);
        let b = ScoreBreakdown::compute(&fb, &history);
        assert_eq!(b.fixed, 1);
        assert_eq!(b.repeated, 0);
    }

    #[test]
    fn degenerate_feedback_has_zero_accuracy() {
        let fb = feedback(&[], &[]);
        let b = ScoreBreakdown::compute(&fb, &[]);
        assert_eq!(b.accuracy, 0.0);
        // answered falls back to 0, total to 1
        assert_eq!(b.completion, 0.0);
        assert_eq!(b.score, 0);
    }

    #[test]
    fn explicit_question_counts_drive_completion() {
        let mut fb = feedback(&["s1"], &["m1"]);
        fb.estimated_total_questions = Some(10);
        fb.answered_questions = Some(5);
        let b = ScoreBreakdown::compute(&fb, &[]);
        assert!((b.completion - 0.5).abs() < f64::EPSILON);
        assert_eq!(b.score, 35);

        // Zero reads as absent and falls back to the judged count.
        fb.estimated_total_questions = Some(0);
        fb.answered_questions = Some(0);
        assert!((completion(&fb) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_is_clamped_to_range() {
        let mut fb = feedback(&["a", "b", "c", "d", "e"], &[]);
        fb.estimated_total_questions = Some(1);
        fb.answered_questions = Some(40);
        let history = vec![attempt(0, &[], &["1", "2", "3", "4", "5", "6"])];
        let b = ScoreBreakdown::compute(&fb, &history);
        assert!(b.raw > 100.0);
        assert_eq!(b.score, 100);

        let fb = feedback(&[], &["1", "2", "3", "4", "5", "6", "7", "8"]);
        let history = vec![attempt(100, &["x"], &["1", "2", "3", "4", "5", "6", "7", "8"])];
        let b = ScoreBreakdown::compute(&fb, &history);
        assert!(b.raw < 0.0);
        assert_eq!(b.score, 0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let history = vec![attempt(60, &["a"], &["b", "c"])];
        let fb = feedback(&["a", "d"], &["c"]);
        let first = elite_score(&fb, &history);
        for _ in 0..10 {
            assert_eq!(elite_score(&fb, &history), first);
        }
    }

    #[test]
    fn round_half_up() {
        assert_eq!(clamp_round(44.5), 45);
        assert_eq!(clamp_round(44.49), 44);
        assert_eq!(clamp_round(-3.0), 0);
        assert_eq!(clamp_round(f64::NAN), 0);
        assert_eq!(clamp_round(f64::INFINITY), 100);
    }
}
