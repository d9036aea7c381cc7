//! Snapshot building: broadcast views and structural copies for compensation

use crate::netcode::interpolation::{EntityKind, EntityState, StateSnapshot};
use crate::ws::protocol::{EffectView, GameEvent, GameStateView, PlayerView};

use super::state::{Match, PlayerState, Vec2};

/// Builds the per-tick outputs of a match
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Full client view (sent as `ServerMsg::State`)
    pub fn view(m: &Match, events: Vec<GameEvent>) -> GameStateView {
        let now = m.now_ms();
        GameStateView {
            match_id: m.id,
            tick: m.tick,
            time_ms: now,
            wave: m.wave,
            next_wave_in_ms: (m.next_wave_ms - now).max(0.0),
            status: m.status,
            winner: m.winner,
            players: m.players.iter().map(|p| Self::player_view(p, now)).collect(),
            projectiles: m.projectiles.clone(),
            enemies: m.enemies.clone(),
            events,
        }
    }

    fn player_view(p: &PlayerState, now: f64) -> PlayerView {
        PlayerView {
            player_id: p.player_id,
            side: p.side,
            hero: p.hero,
            gold: p.gold,
            energy: p.energy,
            max_energy: p.max_energy,
            base_hp: p.base_hp,
            base_max_hp: p.base_max_hp,
            ability_cooldown_ms: p.ability_cooldown_remaining(now),
            units: p.units.clone(),
            towers: p.towers.clone(),
            effects: p
                .effects
                .iter()
                .filter(|e| e.is_active(now))
                .map(|e| EffectView {
                    kind: e.kind,
                    remaining_ms: e.ends_at() - now,
                })
                .collect(),
            units_killed: p.units_killed,
            towers_destroyed: p.towers_destroyed,
            enemies_killed: p.enemies_killed,
            success_streak: p.success_streak,
            commander: p.commander,
            last_input_seq: p.last_input_seq,
        }
    }

    /// Structural copy of renderable entities only (id, kind, position, rotation)
    pub fn capture(m: &Match, timestamp: f64, sequence: u64) -> StateSnapshot {
        let mut entities = Vec::new();

        for player in &m.players {
            entities.push(EntityState {
                id: player.side.index() as u32,
                kind: EntityKind::Commander,
                owner: Some(player.player_id),
                position: player.commander,
                rotation: 0.0,
            });
            entities.extend(player.units.iter().filter(|u| u.alive).map(|u| EntityState {
                id: u.id,
                kind: EntityKind::Unit,
                owner: Some(u.owner),
                position: u.position,
                rotation: u.position.heading_to(u.target),
            }));
            entities.extend(player.towers.iter().filter(|t| t.alive).map(|t| EntityState {
                id: t.id,
                kind: EntityKind::Tower,
                owner: Some(t.owner),
                position: t.position,
                rotation: 0.0,
            }));
        }
        entities.extend(m.projectiles.iter().map(|p| EntityState {
            id: p.id,
            kind: EntityKind::Projectile,
            owner: Some(p.owner),
            position: p.position,
            rotation: Vec2::ZERO.heading_to(p.velocity),
        }));
        entities.extend(m.enemies.iter().filter(|e| e.alive).map(|e| EntityState {
            id: e.id,
            kind: EntityKind::Enemy,
            owner: None,
            position: e.position,
            rotation: e.position.heading_to(e.target),
        }));

        StateSnapshot {
            timestamp,
            sequence,
            tick: m.tick,
            base_hp: [m.players[0].base_hp, m.players[1].base_hp],
            entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::UnitKind;
    use crate::game::state::Side;
    use crate::game::testing::test_match;

    #[test]
    fn capture_copies_live_entities() {
        let mut m = test_match();
        let id = m.spawn_unit(Side::A, UnitKind::Soldier);
        let snapshot = SnapshotBuilder::capture(&m, 1234.0, 9);

        assert_eq!(snapshot.timestamp, 1234.0);
        assert_eq!(snapshot.sequence, 9);
        let unit = snapshot
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Unit && e.id == id)
            .unwrap();
        assert_eq!(unit.position, m.player(Side::A).units[0].position);
        assert_eq!(
            snapshot.entities.iter().filter(|e| e.kind == EntityKind::Commander).count(),
            2
        );

        // Later mutation does not leak into the copy
        m.player_mut(Side::A).units[0].position = Vec2::new(1.0, 1.0);
        assert_ne!(unit.position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn view_reports_time_to_next_wave() {
        let mut m = test_match();
        m.next_wave_ms = 5_000.0;
        let view = m.update_game_state(1.0);
        assert_eq!(view.tick, 1);
        assert_eq!(view.next_wave_in_ms, 4_000.0);
        assert_eq!(view.players.len(), 2);
    }
}
