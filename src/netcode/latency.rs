//! Round-trip latency and jitter per connection

use std::collections::VecDeque;

use serde::Serialize;

/// RTT samples kept per player
pub const LATENCY_SAMPLES: usize = 20;

/// Broadcast rate for healthy connections
pub const RATE_HIGH: u32 = 60;
pub const RATE_MEDIUM: u32 = 45;
/// Broadcast rate for degraded connections
pub const RATE_LOW: u32 = 30;

/// Connection state as seen by the compensation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No samples yet
    Idle,
    Sampling,
    /// Latency or jitter in the lowest tier
    Degraded,
}

/// Map latency/jitter (ms) onto an update rate
pub fn send_rate_for(latency_ms: f64, jitter_ms: f64) -> u32 {
    if latency_ms <= 80.0 && jitter_ms <= 20.0 {
        RATE_HIGH
    } else if latency_ms <= 150.0 && jitter_ms <= 40.0 {
        RATE_MEDIUM
    } else {
        RATE_LOW
    }
}

/// What the transport learns after each ping
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyReport {
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub state: LinkState,
    pub send_rate: u32,
    pub samples: usize,
}

/// Sliding window of round-trip samples
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: VecDeque<f64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(LATENCY_SAMPLES),
        }
    }

    /// Record one RTT. Negative or non-finite samples are ignored.
    pub fn record(&mut self, rtt_ms: f64) -> bool {
        if !rtt_ms.is_finite() || rtt_ms < 0.0 {
            return false;
        }
        if self.samples.len() == LATENCY_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Simple moving average
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Population standard deviation of the window
    pub fn jitter(&self) -> Option<f64> {
        let mean = self.average()?;
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        Some(variance.sqrt())
    }

    pub fn state(&self) -> LinkState {
        match (self.average(), self.jitter()) {
            (Some(latency), Some(jitter)) if send_rate_for(latency, jitter) == RATE_LOW => LinkState::Degraded,
            (Some(_), Some(_)) => LinkState::Sampling,
            _ => LinkState::Idle,
        }
    }

    /// Current rate; idle connections get the full rate
    pub fn send_rate(&self) -> u32 {
        match (self.average(), self.jitter()) {
            (Some(latency), Some(jitter)) => send_rate_for(latency, jitter),
            _ => RATE_HIGH,
        }
    }

    pub fn report(&self) -> LatencyReport {
        LatencyReport {
            latency_ms: self.average().unwrap_or(0.0),
            jitter_ms: self.jitter().unwrap_or(0.0),
            state: self.state(),
            send_rate: self.send_rate(),
            samples: self.samples.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_is_idle() {
        let tracker = LatencyTracker::new();
        assert_eq!(tracker.state(), LinkState::Idle);
        assert_eq!(tracker.average(), None);
        assert_eq!(tracker.send_rate(), RATE_HIGH);
    }

    #[test]
    fn average_and_population_jitter() {
        let mut tracker = LatencyTracker::new();
        for rtt in [40.0, 60.0, 40.0, 60.0] {
            tracker.record(rtt);
        }
        assert_eq!(tracker.average(), Some(50.0));
        assert_eq!(tracker.jitter(), Some(10.0));
        assert_eq!(tracker.state(), LinkState::Sampling);
    }

    #[test]
    fn window_keeps_last_twenty_samples() {
        let mut tracker = LatencyTracker::new();
        for _ in 0..30 {
            tracker.record(500.0);
        }
        for _ in 0..LATENCY_SAMPLES {
            tracker.record(30.0);
        }
        assert_eq!(tracker.len(), LATENCY_SAMPLES);
        assert_eq!(tracker.average(), Some(30.0));
        assert_eq!(tracker.jitter(), Some(0.0));
    }

    #[test]
    fn invalid_samples_are_ignored() {
        let mut tracker = LatencyTracker::new();
        assert!(!tracker.record(-5.0));
        assert!(!tracker.record(f64::NAN));
        assert!(tracker.is_empty());
    }

    #[test]
    fn send_rate_tiers() {
        assert_eq!(send_rate_for(80.0, 20.0), 60);
        assert_eq!(send_rate_for(81.0, 5.0), 45);
        assert_eq!(send_rate_for(50.0, 25.0), 45);
        assert_eq!(send_rate_for(150.0, 40.0), 45);
        assert_eq!(send_rate_for(151.0, 0.0), 30);
        assert_eq!(send_rate_for(20.0, 41.0), 30);
    }

    #[test]
    fn high_latency_degrades() {
        let mut tracker = LatencyTracker::new();
        tracker.record(300.0);
        assert_eq!(tracker.state(), LinkState::Degraded);
        assert_eq!(tracker.report().send_rate, RATE_LOW);
    }
}
