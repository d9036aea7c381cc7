//! Compensation service: per-player and per-match buffers behind one handle

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::game::state::Vec2;

use super::input_history::{InputHistory, InputSample};
use super::interpolation::{InterpolatedState, SnapshotBuffer, StateSnapshot};
use super::latency::{LatencyReport, LatencyTracker, RATE_HIGH};
use super::reconcile::{reconcile, ReconciliationResult};

/// Latency, input and snapshot buffers, updated from connection tasks and match
/// actors without touching match state
#[derive(Default)]
pub struct CompensationService {
    latency: DashMap<Uuid, LatencyTracker>,
    inputs: DashMap<Uuid, InputHistory>,
    snapshots: DashMap<Uuid, Arc<RwLock<SnapshotBuffer>>>,
}

impl CompensationService {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Latency
    // ------------------------------------------------------------------------

    /// Record an RTT sample. `None` if the sample was rejected.
    pub fn update_player_latency(&self, player_id: Uuid, rtt_ms: f64) -> Option<LatencyReport> {
        let mut tracker = self.latency.entry(player_id).or_default();
        tracker.record(rtt_ms).then(|| tracker.report())
    }

    pub fn latency_report(&self, player_id: &Uuid) -> Option<LatencyReport> {
        self.latency.get(player_id).map(|t| t.report())
    }

    /// Updates per second for this player's state stream
    pub fn send_rate(&self, player_id: &Uuid) -> u32 {
        self.latency.get(player_id).map_or(RATE_HIGH, |t| t.send_rate())
    }

    // ------------------------------------------------------------------------
    // Inputs and reconciliation
    // ------------------------------------------------------------------------

    pub fn store_player_input(&self, player_id: Uuid, sample: InputSample) -> bool {
        self.inputs.entry(player_id).or_default().push(sample)
    }

    pub fn pending_inputs(&self, player_id: &Uuid, after_seq: u32) -> Vec<InputSample> {
        self.inputs
            .get(player_id)
            .map(|h| h.inputs_after(after_seq))
            .unwrap_or_default()
    }

    /// Forget inputs the server has applied
    pub fn acknowledge_inputs(&self, player_id: &Uuid, through_seq: u32) {
        if let Some(mut history) = self.inputs.get_mut(player_id) {
            history.discard_through(through_seq);
        }
    }

    /// Replay inputs newer than `acked_seq` from the authoritative `server` position
    /// and compare with the client's `predicted` one
    pub fn reconcile_player_state(
        &self,
        player_id: &Uuid,
        predicted: Vec2,
        server: Vec2,
        acked_seq: u32,
    ) -> ReconciliationResult {
        let pending = self.pending_inputs(player_id, acked_seq);
        reconcile(predicted, server, &pending)
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    pub fn push_snapshot(&self, match_id: Uuid, snapshot: StateSnapshot) {
        let buffer = self
            .snapshots
            .entry(match_id)
            .or_insert_with(|| Arc::new(RwLock::new(SnapshotBuffer::new())))
            .clone();
        buffer.write().push(snapshot);
    }

    fn buffer(&self, match_id: &Uuid) -> Option<Arc<RwLock<SnapshotBuffer>>> {
        self.snapshots.get(match_id).map(|b| b.value().clone())
    }

    pub fn interpolate_state(&self, match_id: &Uuid, render_time: f64) -> Option<InterpolatedState> {
        let buffer = self.buffer(match_id)?;
        let state = buffer.read().interpolate(render_time);
        state
    }

    /// Snapshot closest to `now - latency` for this player (latency 0 if unmeasured)
    pub fn rewind_to_player_time(&self, match_id: &Uuid, player_id: &Uuid, now_ms: f64) -> Option<StateSnapshot> {
        let latency = self.latency_report(player_id).map_or(0.0, |r| r.latency_ms);
        let buffer = self.buffer(match_id)?;
        let snapshot = buffer.read().closest_to(now_ms - latency).cloned();
        snapshot
    }

    pub fn snapshot_count(&self, match_id: &Uuid) -> usize {
        let Some(buffer) = self.buffer(match_id) else {
            return 0;
        };
        let len = buffer.read().len();
        len
    }

    // ------------------------------------------------------------------------
    // Cleanup (idempotent)
    // ------------------------------------------------------------------------

    pub fn clear_player(&self, player_id: &Uuid) {
        let had_latency = self.latency.remove(player_id).is_some();
        let had_inputs = self.inputs.remove(player_id).is_some();
        if had_latency || had_inputs {
            debug!(player_id = %player_id, "Cleared compensation buffers");
        }
    }

    pub fn clear_match(&self, match_id: Uuid) {
        if self.snapshots.remove(&match_id).is_some() {
            debug!(match_id = %match_id, "Cleared snapshot buffer");
        }
    }

    pub fn tracked_players(&self) -> usize {
        self.latency.len().max(self.inputs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcode::input_history::InputPayload;
    use crate::netcode::interpolation::{EntityKind, EntityState};
    use crate::netcode::latency::{LinkState, RATE_LOW};
    use crate::netcode::reconcile::{FIXED_STEP, MOVE_SPEED};

    fn snapshot(sequence: u64, timestamp: f64, x: f32) -> StateSnapshot {
        StateSnapshot {
            timestamp,
            sequence,
            tick: sequence,
            base_hp: [1000.0, 1000.0],
            entities: vec![EntityState {
                id: 1,
                kind: EntityKind::Unit,
                owner: None,
                position: Vec2::new(x, 0.0),
                rotation: 0.0,
            }],
        }
    }

    #[test]
    fn missing_ids_yield_empty_results() {
        let service = CompensationService::new();
        let nobody = Uuid::new_v4();
        assert!(service.latency_report(&nobody).is_none());
        assert!(service.pending_inputs(&nobody, 0).is_empty());
        assert!(service.interpolate_state(&nobody, 0.0).is_none());
        assert!(service.rewind_to_player_time(&nobody, &nobody, 0.0).is_none());
        assert_eq!(service.send_rate(&nobody), RATE_HIGH);

        let result = service.reconcile_player_state(&nobody, Vec2::new(1.0, 1.0), Vec2::ZERO, 0);
        assert_eq!(result.position, Vec2::ZERO);
        assert!(!result.needs_correction);
    }

    #[test]
    fn latency_drives_send_rate() {
        let service = CompensationService::new();
        let player = Uuid::new_v4();
        let report = service.update_player_latency(player, 400.0).unwrap();
        assert_eq!(report.state, LinkState::Degraded);
        assert_eq!(service.send_rate(&player), RATE_LOW);
        assert!(service.update_player_latency(player, -1.0).is_none());
    }

    #[test]
    fn reconcile_replays_unacknowledged_inputs() {
        let service = CompensationService::new();
        let player = Uuid::new_v4();
        for seq in 1..=4 {
            service.store_player_input(
                player,
                InputSample {
                    seq,
                    payload: InputPayload {
                        down: true,
                        ..Default::default()
                    },
                    client_ts: 0.0,
                },
            );
        }

        // Server has applied 1 and 2; client claims it is at the right spot after 4
        let step = MOVE_SPEED * FIXED_STEP;
        let server = Vec2::new(0.0, 2.0 * step);
        let predicted = Vec2::new(0.0, 4.0 * step);
        let result = service.reconcile_player_state(&player, predicted, server, 2);
        assert_eq!(result.replayed, 2);
        assert!(!result.needs_correction);

        service.acknowledge_inputs(&player, 2);
        assert_eq!(service.pending_inputs(&player, 0).len(), 2);
    }

    #[test]
    fn rewind_subtracts_player_latency() {
        let service = CompensationService::new();
        let match_id = Uuid::new_v4();
        let player = Uuid::new_v4();
        for seq in 0..10u64 {
            service.push_snapshot(match_id, snapshot(seq, 1000.0 + seq as f64 * 20.0, seq as f32));
        }

        // Unmeasured player: no rewind
        assert_eq!(service.rewind_to_player_time(&match_id, &player, 1180.0).unwrap().sequence, 9);

        service.update_player_latency(player, 100.0);
        assert_eq!(service.rewind_to_player_time(&match_id, &player, 1180.0).unwrap().sequence, 4);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let service = CompensationService::new();
        let match_id = Uuid::new_v4();
        let player = Uuid::new_v4();
        service.update_player_latency(player, 50.0);
        service.push_snapshot(match_id, snapshot(1, 0.0, 0.0));

        service.clear_player(&player);
        service.clear_player(&player);
        service.clear_match(match_id);
        service.clear_match(match_id);

        assert_eq!(service.tracked_players(), 0);
        assert_eq!(service.snapshot_count(&match_id), 0);
    }
}
