//! Player-initiated actions. Every rejection leaves the match untouched.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::netcode::input_history::InputPayload;
use crate::netcode::reconcile::apply_input;
use crate::ws::protocol::GameEvent;

use super::abilities::{hero_definition, HeroId};
use super::catalog::{clamp_to_arena, in_bounds, TowerKind, TowerStats, UnitKind, UnitStats};
use super::economy::SubmissionOutcome;
use super::state::{EntityId, Match, Stat, Tower, Vec2};

/// Minimum time between two deploys by the same player
pub const DEPLOY_COOLDOWN_MS: f64 = 1_000.0;

/// Why an action was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Not enough gold (need {required}, have {available})")]
    InsufficientGold { required: f32, available: f32 },

    #[error("Not enough energy (need {required}, have {available})")]
    InsufficientEnergy { required: f32, available: f32 },

    #[error("Ability on cooldown")]
    OnCooldown { remaining_ms: u64 },

    #[error("Unknown type: {0}")]
    UnknownKind(String),

    #[error("Not unlocked: {0}")]
    Locked(String),

    #[error("Invalid position")]
    InvalidPosition,

    #[error("Deploy on cooldown")]
    DeployCooldown { remaining_ms: u64 },

    #[error("Match is over")]
    MatchFinished,
}

impl ActionError {
    /// Stable machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::InsufficientGold { .. } => "insufficient_gold",
            ActionError::InsufficientEnergy { .. } => "insufficient_energy",
            ActionError::OnCooldown { .. } => "on_cooldown",
            ActionError::UnknownKind(_) => "unknown_kind",
            ActionError::Locked(_) => "locked",
            ActionError::InvalidPosition => "invalid_position",
            ActionError::DeployCooldown { .. } => "deploy_cooldown",
            ActionError::MatchFinished => "match_finished",
        }
    }

    pub fn remaining_cooldown_ms(&self) -> Option<u64> {
        match self {
            ActionError::OnCooldown { remaining_ms } | ActionError::DeployCooldown { remaining_ms } => {
                Some(*remaining_ms)
            }
            _ => None,
        }
    }
}

/// Successful action payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionOk {
    TowerPlaced { tower_id: EntityId, kind: TowerKind, gold: f32 },
    UnitDeployed { unit_id: EntityId, kind: UnitKind, gold: f32, energy: f32 },
    AbilityUsed { hero: HeroId, cooldown_ms: u64 },
    SubmissionProcessed(SubmissionOutcome),
}

pub type ActionResult = Result<ActionOk, ActionError>;

/// `{success, ...}` or `{success: false, error, remaining_cooldown_ms?}` as sent to clients
#[derive(Debug, Clone, Serialize)]
pub struct ActionReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionOk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_cooldown_ms: Option<u64>,
}

impl From<ActionResult> for ActionReply {
    fn from(result: ActionResult) -> Self {
        match result {
            Ok(ok) => Self {
                success: true,
                result: Some(ok),
                error: None,
                code: None,
                remaining_cooldown_ms: None,
            },
            Err(err) => Self {
                success: false,
                result: None,
                error: Some(err.to_string()),
                code: Some(err.code()),
                remaining_cooldown_ms: err.remaining_cooldown_ms(),
            },
        }
    }
}

impl Match {
    /// Place a tower on the player's half of the arena
    pub fn place_tower(&mut self, player_id: Uuid, kind: &str, x: f32, y: f32) -> Option<ActionResult> {
        let side = self.side_of(player_id)?;
        if !self.is_running() {
            return Some(Err(ActionError::MatchFinished));
        }
        let Ok(kind) = kind.parse::<TowerKind>() else {
            return Some(Err(ActionError::UnknownKind(kind.to_string())));
        };

        let position = Vec2::new(x, y);
        let stats = TowerStats::for_kind(kind);
        let player = self.player(side);
        if !player.unlocked_towers.contains(&kind) {
            return Some(Err(ActionError::Locked(format!("{:?}", kind))));
        }
        if !x.is_finite() || !y.is_finite() || !in_bounds(position) || !side.owns_position(position) {
            return Some(Err(ActionError::InvalidPosition));
        }
        if player.gold < stats.gold_cost {
            return Some(Err(ActionError::InsufficientGold {
                required: stats.gold_cost,
                available: player.gold,
            }));
        }

        let tower_id = self.next_entity_id();
        let player = self.player_mut(side);
        let passive = hero_definition(player.hero).passive;
        player.add_gold(-stats.gold_cost);
        player.towers.push(Tower {
            id: tower_id,
            owner: player_id,
            kind,
            position,
            hp: stats.hp,
            max_hp: stats.hp,
            damage: stats.damage * player.bonuses.tower_damage * passive.tower_damage,
            range: stats.range * player.bonuses.tower_range,
            fire_rate: stats.fire_rate,
            splash_radius: stats.splash_radius,
            chain_count: stats.chain_count,
            slow_on_hit: stats.slow_on_hit,
            beam: stats.beam,
            regen_per_sec: player.bonuses.tower_regen,
            alive: true,
            last_shot_ms: None,
        });
        let gold = player.gold;

        self.push_event(GameEvent::TowerPlaced {
            player_id,
            tower_id,
            kind,
            x,
            y,
        });
        Some(Ok(ActionOk::TowerPlaced { tower_id, kind, gold }))
    }

    /// Spend gold and energy to send a unit down the lane
    pub fn deploy_unit(&mut self, player_id: Uuid, kind: &str) -> Option<ActionResult> {
        let side = self.side_of(player_id)?;
        if !self.is_running() {
            return Some(Err(ActionError::MatchFinished));
        }
        let Ok(kind) = kind.parse::<UnitKind>() else {
            return Some(Err(ActionError::UnknownKind(kind.to_string())));
        };

        let now = self.now_ms();
        let stats = UnitStats::for_kind(kind);
        let player = self.player(side);
        if !kind.is_deployable() || !player.unlocked_units.contains(&kind) {
            return Some(Err(ActionError::Locked(format!("{:?}", kind))));
        }
        if let Some(last) = player.last_deploy_ms {
            let cooldown = DEPLOY_COOLDOWN_MS
                * player.effect_factor(now, Stat::DeployCooldown, stats.element) as f64;
            let remaining = cooldown - (now - last);
            if remaining > 0.0 {
                return Some(Err(ActionError::DeployCooldown {
                    remaining_ms: remaining.ceil() as u64,
                }));
            }
        }
        if player.gold < stats.gold_cost {
            return Some(Err(ActionError::InsufficientGold {
                required: stats.gold_cost,
                available: player.gold,
            }));
        }
        if player.energy < stats.energy_cost {
            return Some(Err(ActionError::InsufficientEnergy {
                required: stats.energy_cost,
                available: player.energy,
            }));
        }

        let player = self.player_mut(side);
        player.add_gold(-stats.gold_cost);
        player.add_energy(-stats.energy_cost);
        player.last_deploy_ms = Some(now);
        let (gold, energy) = (player.gold, player.energy);

        let unit_id = self.spawn_unit(side, kind);
        self.push_event(GameEvent::UnitDeployed {
            player_id,
            unit_id,
            kind,
        });
        Some(Ok(ActionOk::UnitDeployed {
            unit_id,
            kind,
            gold,
            energy,
        }))
    }

    /// Move the player's commander for one input. Stale sequences are ignored.
    /// Returns whether the input was applied.
    pub fn apply_commander_input(&mut self, player_id: Uuid, seq: u32, input: &InputPayload) -> Option<bool> {
        let side = self.side_of(player_id)?;
        let player = self.player_mut(side);
        if seq <= player.last_input_seq {
            return Some(false);
        }
        player.commander = clamp_to_arena(apply_input(player.commander, input));
        player.last_input_seq = seq;
        Some(true)
    }

    /// Authoritative commander position and the last input it reflects
    pub fn commander_state(&self, player_id: Uuid) -> Option<(Vec2, u32)> {
        let side = self.side_of(player_id)?;
        let player = self.player(side);
        Some((player.commander, player.last_input_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::BASE_A;
    use crate::game::state::{Effect, EffectKind, EffectScope, Side};
    use crate::game::testing::test_match;
    use crate::netcode::reconcile::{FIXED_STEP, MOVE_SPEED};

    #[test]
    fn tower_placement_spends_gold() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        let result = m.place_tower(player, "arrow", 200.0, 300.0);
        assert!(matches!(result, Some(Ok(ActionOk::TowerPlaced { gold, .. })) if gold == 200.0));
        assert_eq!(m.player(Side::A).towers.len(), 1);
    }

    #[test]
    fn warlord_passive_boosts_tower_damage() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        m.place_tower(player, "arrow", 200.0, 300.0);
        let base = TowerStats::for_kind(TowerKind::Arrow).damage;
        assert!((m.player(Side::A).towers[0].damage - base * 1.1).abs() < 1e-4);
    }

    #[test]
    fn tower_rejections_do_not_mutate() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        let before = m.player(Side::A).gold;

        assert_eq!(
            m.place_tower(player, "catapult", 200.0, 300.0),
            Some(Err(ActionError::UnknownKind("catapult".into())))
        );
        assert!(matches!(m.place_tower(player, "laser", 200.0, 300.0), Some(Err(ActionError::Locked(_)))));
        assert_eq!(
            m.place_tower(player, "arrow", 900.0, 300.0),
            Some(Err(ActionError::InvalidPosition))
        );
        m.player_mut(Side::A).gold = 10.0;
        assert!(matches!(
            m.place_tower(player, "arrow", 200.0, 300.0),
            Some(Err(ActionError::InsufficientGold { .. }))
        ));

        m.player_mut(Side::A).gold = before;
        assert!(m.player(Side::A).towers.is_empty());
        assert!(m.events.is_empty());
    }

    #[test]
    fn deploy_respects_cooldown_and_costs() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        assert!(matches!(m.deploy_unit(player, "soldier"), Some(Ok(ActionOk::UnitDeployed { .. }))));

        match m.deploy_unit(player, "soldier") {
            Some(Err(err @ ActionError::DeployCooldown { .. })) => {
                assert_eq!(err.remaining_cooldown_ms(), Some(1_000));
            }
            other => panic!("expected deploy cooldown, got {:?}", other),
        }

        m.update_game_state(1.0);
        m.player_mut(Side::A).energy = 0.0;
        let gold = m.player(Side::A).gold;
        assert!(matches!(
            m.deploy_unit(player, "soldier"),
            Some(Err(ActionError::InsufficientEnergy { .. }))
        ));
        assert_eq!(m.player(Side::A).gold, gold);
        assert_eq!(m.player(Side::A).units.len(), 1);
    }

    #[test]
    fn rapid_deploy_shortens_deploy_cooldown() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        m.player_mut(Side::A)
            .add_effect(Effect::new(EffectKind::RapidDeploy, EffectScope::Deployment, 0.25, 0.0, 10_000.0));
        m.deploy_unit(player, "soldier");
        m.update_game_state(0.3);
        assert!(matches!(m.deploy_unit(player, "archer"), Some(Ok(_))));
    }

    #[test]
    fn elite_cannot_be_deployed() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        assert!(matches!(m.deploy_unit(player, "elite"), Some(Err(ActionError::Locked(_)))));
    }

    #[test]
    fn actions_after_finish_are_rejected() {
        let mut m = test_match();
        let a = m.player(Side::A).player_id;
        let b = m.player(Side::B).player_id;
        m.forfeit(b);
        assert_eq!(m.deploy_unit(a, "soldier"), Some(Err(ActionError::MatchFinished)));
        assert!(m.place_tower(Uuid::new_v4(), "arrow", 1.0, 1.0).is_none());
    }

    #[test]
    fn commander_ignores_stale_inputs() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        let right = InputPayload {
            right: true,
            ..Default::default()
        };
        assert_eq!(m.apply_commander_input(player, 1, &right), Some(true));
        assert_eq!(m.apply_commander_input(player, 1, &right), Some(false));

        let (pos, seq) = m.commander_state(player).unwrap();
        assert_eq!(seq, 1);
        assert!((pos.x - (BASE_A.x + MOVE_SPEED * FIXED_STEP)).abs() < 1e-4);
    }

    #[test]
    fn commander_stays_inside_the_arena() {
        let mut m = test_match();
        let player = m.player(Side::A).player_id;
        let up_left = InputPayload {
            up: true,
            left: true,
            ..Default::default()
        };
        for seq in 1..=200 {
            assert_eq!(m.apply_commander_input(player, seq, &up_left), Some(true));
        }

        let (pos, _) = m.commander_state(player).unwrap();
        assert_eq!(pos, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn reply_carries_remaining_cooldown() {
        let reply = ActionReply::from(Err(ActionError::OnCooldown { remaining_ms: 1200 }));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["remaining_cooldown_ms"], 1200);
        assert_eq!(json["code"], "on_cooldown");
    }
}
