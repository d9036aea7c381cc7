//! Timestamped snapshot ring for interpolation and lag-compensated rewind

use std::collections::VecDeque;

use serde::Serialize;
use uuid::Uuid;

use crate::game::state::Vec2;

/// Snapshots kept per match (~1s at 60 ticks/s)
pub const SNAPSHOT_HISTORY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Commander,
    Unit,
    Tower,
    Projectile,
    Enemy,
}

/// Renderable subset of one entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntityState {
    pub id: u32,
    pub kind: EntityKind,
    pub owner: Option<Uuid>,
    pub position: Vec2,
    pub rotation: f32,
}

impl EntityState {
    fn same_entity(&self, other: &EntityState) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

/// Structural copy of a match at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Server wall clock (ms)
    pub timestamp: f64,
    pub sequence: u64,
    pub tick: u64,
    pub base_hp: [f32; 2],
    pub entities: Vec<EntityState>,
}

/// Result of sampling the buffer at a render time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpolatedState {
    pub render_time: f64,
    pub from_sequence: u64,
    pub to_sequence: u64,
    pub t: f32,
    pub base_hp: [f32; 2],
    pub entities: Vec<EntityState>,
}

/// Blend two snapshots. Entities and rotation come from the nearer endpoint,
/// positions of entities present in both are lerped.
fn blend(from: &StateSnapshot, to: &StateSnapshot, t: f32, render_time: f64) -> InterpolatedState {
    let (near, other) = if t < 0.5 { (from, to) } else { (to, from) };

    let entities = near
        .entities
        .iter()
        .map(|entity| {
            let Some(counterpart) = other.entities.iter().find(|e| e.same_entity(entity)) else {
                return *entity;
            };
            let (a, b) = if t < 0.5 { (entity, counterpart) } else { (counterpart, entity) };
            EntityState {
                position: a.position.lerp(b.position, t),
                ..*entity
            }
        })
        .collect();

    InterpolatedState {
        render_time,
        from_sequence: from.sequence,
        to_sequence: to.sequence,
        t,
        base_hp: near.base_hp,
        entities,
    }
}

/// Per-match bounded ring of snapshots, oldest first
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<StateSnapshot>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::with_capacity(SNAPSHOT_HISTORY),
        }
    }

    pub fn push(&mut self, snapshot: StateSnapshot) {
        if self.snapshots.len() == SNAPSHOT_HISTORY {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&StateSnapshot> {
        self.snapshots.back()
    }

    /// State at `render_time`: lerp inside the bracketing pair, or the newest
    /// snapshot unchanged when no pair brackets it
    pub fn interpolate(&self, render_time: f64) -> Option<InterpolatedState> {
        let bracket = self
            .snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .find(|(from, to)| from.timestamp <= render_time && render_time <= to.timestamp);

        match bracket {
            Some((from, to)) => {
                let span = to.timestamp - from.timestamp;
                let t = if span <= 0.0 {
                    0.0
                } else {
                    ((render_time - from.timestamp) / span).clamp(0.0, 1.0) as f32
                };
                Some(blend(from, to, t, render_time))
            }
            None => {
                let newest = self.latest()?;
                Some(blend(newest, newest, 1.0, render_time))
            }
        }
    }

    /// Snapshot whose timestamp is closest to `time`; ties go to the older one
    pub fn closest_to(&self, time: f64) -> Option<&StateSnapshot> {
        let mut best: Option<(&StateSnapshot, f64)> = None;
        for snapshot in &self.snapshots {
            let gap = (snapshot.timestamp - time).abs();
            if best.map_or(true, |(_, g)| gap < g) {
                best = Some((snapshot, gap));
            }
        }
        best.map(|(snapshot, _)| snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u32, x: f32, y: f32, rotation: f32) -> EntityState {
        EntityState {
            id,
            kind: EntityKind::Unit,
            owner: None,
            position: Vec2::new(x, y),
            rotation,
        }
    }

    fn snapshot(sequence: u64, timestamp: f64, entities: Vec<EntityState>) -> StateSnapshot {
        StateSnapshot {
            timestamp,
            sequence,
            tick: sequence,
            base_hp: [1000.0, 1000.0 - sequence as f32],
            entities,
        }
    }

    fn two_snapshot_buffer() -> SnapshotBuffer {
        let mut buffer = SnapshotBuffer::new();
        buffer.push(snapshot(1, 1000.0, vec![entity(1, 0.1, 0.2, 0.3), entity(2, 5.0, 5.0, 1.0)]));
        buffer.push(snapshot(2, 1100.0, vec![entity(1, 10.7, 20.3, 1.9), entity(3, 7.0, 7.0, 0.5)]));
        buffer
    }

    #[test]
    fn endpoints_return_exact_snapshots() {
        let buffer = two_snapshot_buffer();

        let at_from = buffer.interpolate(1000.0).unwrap();
        assert_eq!(at_from.entities, buffer.snapshots[0].entities);
        assert_eq!(at_from.base_hp, buffer.snapshots[0].base_hp);

        let at_to = buffer.interpolate(1100.0).unwrap();
        assert_eq!(at_to.entities, buffer.snapshots[1].entities);
        assert_eq!(at_to.base_hp, buffer.snapshots[1].base_hp);
    }

    #[test]
    fn midpoint_lerps_position_but_not_rotation() {
        let buffer = two_snapshot_buffer();
        let mid = buffer.interpolate(1025.0).unwrap();
        assert!((mid.t - 0.25).abs() < 1e-6);

        let e = mid.entities.iter().find(|e| e.id == 1).unwrap();
        assert!((e.position.x - (0.1 + (10.7 - 0.1) * 0.25)).abs() < 1e-4);
        assert_eq!(e.rotation, 0.3);
    }

    #[test]
    fn outside_any_bracket_falls_back_to_newest() {
        let buffer = two_snapshot_buffer();
        for render_time in [500.0, 5000.0] {
            let state = buffer.interpolate(render_time).unwrap();
            assert_eq!(state.to_sequence, 2);
            assert_eq!(state.entities, buffer.snapshots[1].entities);
        }
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let buffer = SnapshotBuffer::new();
        assert!(buffer.interpolate(0.0).is_none());
        assert!(buffer.closest_to(0.0).is_none());
    }

    #[test]
    fn ring_is_bounded() {
        let mut buffer = SnapshotBuffer::new();
        for seq in 0..(SNAPSHOT_HISTORY as u64 + 15) {
            buffer.push(snapshot(seq, seq as f64 * 16.0, Vec::new()));
        }
        assert_eq!(buffer.len(), SNAPSHOT_HISTORY);
        assert_eq!(buffer.snapshots[0].sequence, 15);
    }

    #[test]
    fn closest_snapshot_wins() {
        let mut buffer = SnapshotBuffer::new();
        for seq in 0..10u64 {
            buffer.push(snapshot(seq, 1000.0 + seq as f64 * 20.0, Vec::new()));
        }
        assert_eq!(buffer.closest_to(1049.0).unwrap().sequence, 2);
        assert_eq!(buffer.closest_to(1051.0).unwrap().sequence, 3);
        // Exactly between 1040 and 1060
        assert_eq!(buffer.closest_to(1050.0).unwrap().sequence, 2);
        assert_eq!(buffer.closest_to(0.0).unwrap().sequence, 0);
    }
}
