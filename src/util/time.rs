//! Time utilities for the match simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default simulation rate
pub const SIMULATION_TPS: u32 = 60;

/// Fixed delta time (in seconds) for a given tick rate
pub fn tick_delta(tick_rate: u32) -> f32 {
    1.0 / tick_rate.max(1) as f32
}

/// Interval between ticks for a given tick rate
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delta_matches_rate() {
        assert!((tick_delta(60) - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(tick_duration(50), Duration::from_millis(20));
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        assert_eq!(tick_delta(0), 1.0);
        assert_eq!(tick_duration(0), Duration::from_secs(1));
    }
}
