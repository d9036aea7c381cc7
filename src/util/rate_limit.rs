//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Movement inputs arrive once per client frame (60 Hz) plus headroom
pub const INPUT_RATE_LIMIT: u32 = 90;

/// Discrete actions (tower, deploy, ability, submission) per second
pub const ACTION_RATE_LIMIT: u32 = 10;

/// Per-socket rate limiter state
#[derive(Clone)]
pub struct PlayerRateLimiter {
    input_limiter: Arc<Limiter>,
    action_limiter: Arc<Limiter>,
}

impl PlayerRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(INPUT_RATE_LIMIT),
            action_limiter: create_limiter(ACTION_RATE_LIMIT),
        }
    }

    /// Check if a movement/ping message is allowed
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }

    /// Check if a gameplay action is allowed
    pub fn check_action(&self) -> bool {
        self.action_limiter.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_burst_is_capped() {
        let limiter = PlayerRateLimiter::new();
        let allowed = (0..50).filter(|_| limiter.check_action()).count();
        assert_eq!(allowed, ACTION_RATE_LIMIT as usize);
    }
}
