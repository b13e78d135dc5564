//! Bounded round history, newest first.
//!
//! The history is the engine's only durable artifact: each record keeps
//! the seed material and per-bet outcomes needed for after-the-fact
//! fairness verification, and its newest entries feed the scaling
//! estimator.

use std::collections::VecDeque;

use aviator_types::RoundRecord;

#[derive(Clone, Debug)]
pub struct RoundHistory {
    rounds: VecDeque<RoundRecord>,
    cap: usize,
}

impl RoundHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            rounds: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    /// Append a finalized round. The oldest record falls off once the
    /// cap is reached; records are immutable after this point.
    pub fn push(&mut self, record: RoundRecord) {
        self.rounds.push_front(record);
        self.rounds.truncate(self.cap);
    }

    /// Crash points of the most recent `n` rounds, newest first.
    pub fn recent_crash_points(&self, n: usize) -> Vec<f64> {
        self.rounds
            .iter()
            .take(n)
            .map(|round| round.crash_point)
            .collect()
    }

    pub fn latest(&self) -> Option<&RoundRecord> {
        self.rounds.front()
    }

    /// Newest-first iteration over all retained rounds.
    pub fn iter(&self) -> impl Iterator<Item = &RoundRecord> {
        self.rounds.iter()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
