//! Bounded per-player history of client inputs awaiting acknowledgement

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Inputs kept per player (~2s at 60 inputs/s)
pub const INPUT_HISTORY: usize = 120;

/// Directional flags for one fixed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPayload {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputSample {
    pub seq: u32,
    pub payload: InputPayload,
    /// Client clock when the input was sampled (ms)
    pub client_ts: f64,
}

/// Ring of inputs ordered by sequence; the oldest entry is evicted when full
#[derive(Debug, Clone, Default)]
pub struct InputHistory {
    samples: VecDeque<InputSample>,
}

impl InputHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(INPUT_HISTORY),
        }
    }

    /// Append an input. Sequences at or below the newest stored one are dropped.
    pub fn push(&mut self, sample: InputSample) -> bool {
        if self.latest_seq().is_some_and(|latest| sample.seq <= latest) {
            return false;
        }
        if self.samples.len() == INPUT_HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        true
    }

    /// All inputs with a sequence greater than `seq`, oldest first
    pub fn inputs_after(&self, seq: u32) -> Vec<InputSample> {
        self.samples.iter().filter(|s| s.seq > seq).copied().collect()
    }

    /// Drop every input up to and including `seq`
    pub fn discard_through(&mut self, seq: u32) {
        while self.samples.front().is_some_and(|s| s.seq <= seq) {
            self.samples.pop_front();
        }
    }

    pub fn latest_seq(&self) -> Option<u32> {
        self.samples.back().map(|s| s.seq)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seq: u32) -> InputSample {
        InputSample {
            seq,
            payload: InputPayload::default(),
            client_ts: seq as f64 * 16.0,
        }
    }

    #[test]
    fn range_queries() {
        let mut history = InputHistory::new();
        for seq in 1..=10 {
            history.push(sample(seq));
        }
        let after: Vec<u32> = history.inputs_after(7).iter().map(|s| s.seq).collect();
        assert_eq!(after, vec![8, 9, 10]);

        history.discard_through(4);
        assert_eq!(history.len(), 6);
        assert_eq!(history.inputs_after(0)[0].seq, 5);
        assert!(history.inputs_after(10).is_empty());
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let mut history = InputHistory::new();
        for seq in 1..=(INPUT_HISTORY as u32 + 30) {
            history.push(sample(seq));
        }
        assert_eq!(history.len(), INPUT_HISTORY);
        assert_eq!(history.inputs_after(0)[0].seq, 31);
    }

    #[test]
    fn stale_sequences_are_rejected() {
        let mut history = InputHistory::new();
        assert!(history.push(sample(5)));
        assert!(!history.push(sample(5)));
        assert!(!history.push(sample(3)));
        assert_eq!(history.latest_seq(), Some(5));
    }
}
