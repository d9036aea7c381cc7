//! Server reconciliation of client-predicted commander movement

use serde::Serialize;

use crate::game::state::Vec2;

use super::input_history::{InputPayload, InputSample};

/// Commander speed (world units per second)
pub const MOVE_SPEED: f32 = 300.0;
/// Simulated duration of one input
pub const FIXED_STEP: f32 = 1.0 / 60.0;
/// Divergence above which the client is corrected
pub const CORRECTION_TOLERANCE: f32 = 0.5;

/// One fixed step of motion. Opposite flags cancel.
pub fn apply_input(position: Vec2, input: &InputPayload) -> Vec2 {
    let step = MOVE_SPEED * FIXED_STEP;
    let mut next = position;
    if input.up {
        next.y -= step;
    }
    if input.down {
        next.y += step;
    }
    if input.left {
        next.x -= step;
    }
    if input.right {
        next.x += step;
    }
    next
}

/// Replay `inputs` in order from `start`
pub fn replay(start: Vec2, inputs: &[InputSample]) -> Vec2 {
    inputs.iter().fold(start, |pos, sample| apply_input(pos, &sample.payload))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReconciliationResult {
    /// Authoritative position after replaying pending inputs
    pub position: Vec2,
    /// Distance between that position and the client's claim
    pub divergence: f32,
    pub needs_correction: bool,
    pub replayed: usize,
    /// Sequence of the last replayed input
    pub last_seq: Option<u32>,
}

/// Replay `pending` from the server baseline and compare with `predicted`.
/// Nothing pending means the baseline stands and no correction is due.
pub fn reconcile(predicted: Vec2, server: Vec2, pending: &[InputSample]) -> ReconciliationResult {
    if pending.is_empty() {
        return ReconciliationResult {
            position: server,
            divergence: 0.0,
            needs_correction: false,
            replayed: 0,
            last_seq: None,
        };
    }

    let position = replay(server, pending);
    let divergence = position.distance(predicted);
    ReconciliationResult {
        position,
        divergence,
        needs_correction: divergence > CORRECTION_TOLERANCE,
        replayed: pending.len(),
        last_seq: pending.last().map(|s| s.seq),
    }
}
