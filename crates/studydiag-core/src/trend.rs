//! Score trends and attempt-to-attempt comparison.
//!
//! The moving average is causal: each point only looks back, so appending a
//! new attempt never changes earlier trend values.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::model::{Attempt, Test};

/// Default moving-average window.
pub const DEFAULT_WINDOW: usize = 3;

/// A score at a position on the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub x: usize,
    pub score: u32,
}

/// A score point with its smoothed trend value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub x: usize,
    pub score: u32,
    pub trend: u32,
}

/// Incremental backward-looking moving average.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    values: VecDeque<u32>,
    sum: u64,
}

impl MovingAverage {
    /// A window of 0 is treated as 1.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0,
        }
    }

    /// Add a score and return the rounded mean of the current window.
    pub fn push(&mut self, score: u32) -> u32 {
        if self.values.len() == self.window {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= u64::from(evicted);
            }
        }
        self.values.push_back(score);
        self.sum += u64::from(score);
        round_half_up_div(self.sum, self.values.len() as u64)
    }
}

/// Integer mean rounded half up.
fn round_half_up_div(sum: u64, count: u64) -> u32 {
    ((2 * sum + count) / (2 * count)) as u32
}

/// Attach a trend value to every point.
///
/// `trend[i]` is the rounded mean of scores in `[max(0, i - window + 1), i]`.
pub fn moving_average(points: &[ScorePoint], window: usize) -> Vec<TrendPoint> {
    let mut average = MovingAverage::new(window);
    points
        .iter()
        .map(|p| TrendPoint {
            x: p.x,
            score: p.score,
            trend: average.push(p.score),
        })
        .collect()
}

/// Score series of a test, with 1-based attempt numbers as x.
pub fn score_series(test: &Test) -> Vec<ScorePoint> {
    test.attempts()
        .iter()
        .enumerate()
        .map(|(i, a)| ScorePoint {
            x: i + 1,
            score: a.score,
        })
        .collect()
}

/// Mistakes fixed and still present between two consecutive attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementSummary {
    /// Previous quotes that no longer appear.
    pub fixed: Vec<String>,
    /// Latest quotes that also appeared previously.
    pub still_weak: Vec<String>,
}

impl ImprovementSummary {
    /// Compare `latest` against `previous` by exact quote text.
    pub fn between(previous: &Attempt, latest: &Attempt) -> Self {
        let prev = previous.feedback.mistake_quotes();
        let curr = latest.feedback.mistake_quotes();

        let fixed = prev
            .iter()
            .filter(|q| !curr.contains(q))
            .map(|q| q.to_string())
            .collect();
        let still_weak = curr
            .iter()
            .filter(|q| prev.contains(q))
            .map(|q| q.to_string())
            .collect();

        Self { fixed, still_weak }
    }

    /// Summary for the two most recent attempts of a test.
    pub fn for_test(test: &Test) -> Option<Self> {
        let attempts = test.attempts();
        let latest = attempts.latest()?;
        let previous = attempts.previous()?;
        Some(Self::between(previous, latest))
    }
}

/// Score change between the two most recent attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", content = "points", rename_all = "lowercase")]
pub enum Progress {
    Improved(u32),
    Dropped(u32),
    Unchanged,
}

impl Progress {
    pub fn between(previous_score: u32, latest_score: u32) -> Self {
        match latest_score.cmp(&previous_score) {
            std::cmp::Ordering::Greater => Progress::Improved(latest_score - previous_score),
            std::cmp::Ordering::Less => Progress::Dropped(previous_score - latest_score),
            std::cmp::Ordering::Equal => Progress::Unchanged,
        }
    }

    pub fn for_test(test: &Test) -> Option<Self> {
        let attempts = test.attempts();
        let latest = attempts.latest()?;
        let previous = attempts.previous()?;
        Some(Self::between(previous.score, latest.score))
    }

    /// Signed change in points.
    pub fn delta(&self) -> i64 {
        match *self {
            Progress::Improved(n) => i64::from(n),
            Progress::Dropped(n) => -i64::from(n),
            Progress::Unchanged => 0,
        }
    }
}
