//! Hero definitions: one cooldown-gated active and one always-on passive each.
//!
//! Actives are plain functions looked up through [`hero_definition`], so adding a
//! hero means adding a table row rather than touching combat resolution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ws::protocol::GameEvent;

use super::actions::{ActionError, ActionOk, ActionResult};
use super::state::{Effect, EffectKind, EffectScope, Match, Side};

/// Energy spent per ability activation
pub const ABILITY_ENERGY_COST: f32 = 30.0;

/// Maximum units revived by Renewal
const RENEWAL_REVIVES: usize = 2;

/// Selectable heroes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroId {
    /// Blinds opponent towers
    Fogweaver,
    /// Speeds up water troops
    Tidecaller,
    /// Cloaks troops from towers
    Phantom,
    /// Buffs troop damage
    Warlord,
    /// Heals the base and revives the fallen
    Lifebinder,
    /// Removes the deploy cooldown
    Quartermaster,
}

impl Default for HeroId {
    fn default() -> Self {
        Self::Warlord
    }
}

/// Passive multipliers, applied at spawn or scoring time (1.0 = no effect)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassiveBonus {
    pub coding_score: f32,
    pub water_unit_hp: f32,
    pub unit_speed: f32,
    pub tower_damage: f32,
    pub base_hp: f32,
    pub energy_income: f32,
}

impl PassiveBonus {
    const NONE: PassiveBonus = PassiveBonus {
        coding_score: 1.0,
        water_unit_hp: 1.0,
        unit_speed: 1.0,
        tower_damage: 1.0,
        base_hp: 1.0,
        energy_income: 1.0,
    };
}

/// Applies an active ability for `side` at match time `now_ms`
pub type ActiveAbility = fn(&mut Match, Side, f64);

pub struct HeroDefinition {
    pub id: HeroId,
    pub ability_name: &'static str,
    pub cooldown_ms: f64,
    pub active: ActiveAbility,
    pub passive: PassiveBonus,
}

static HEROES: [HeroDefinition; 6] = [
    HeroDefinition {
        id: HeroId::Fogweaver,
        ability_name: "blinding_fog",
        cooldown_ms: 30_000.0,
        active: blinding_fog,
        passive: PassiveBonus {
            coding_score: 1.15,
            ..PassiveBonus::NONE
        },
    },
    HeroDefinition {
        id: HeroId::Tidecaller,
        ability_name: "riptide",
        cooldown_ms: 25_000.0,
        active: riptide,
        passive: PassiveBonus {
            water_unit_hp: 1.15,
            ..PassiveBonus::NONE
        },
    },
    HeroDefinition {
        id: HeroId::Phantom,
        ability_name: "veil",
        cooldown_ms: 35_000.0,
        active: veil,
        passive: PassiveBonus {
            unit_speed: 1.10,
            ..PassiveBonus::NONE
        },
    },
    HeroDefinition {
        id: HeroId::Warlord,
        ability_name: "battle_cry",
        cooldown_ms: 30_000.0,
        active: battle_cry,
        passive: PassiveBonus {
            tower_damage: 1.10,
            ..PassiveBonus::NONE
        },
    },
    HeroDefinition {
        id: HeroId::Lifebinder,
        ability_name: "renewal",
        cooldown_ms: 45_000.0,
        active: renewal,
        passive: PassiveBonus {
            base_hp: 1.10,
            ..PassiveBonus::NONE
        },
    },
    HeroDefinition {
        id: HeroId::Quartermaster,
        ability_name: "rapid_deploy",
        cooldown_ms: 40_000.0,
        active: rapid_deploy,
        passive: PassiveBonus {
            energy_income: 1.20,
            ..PassiveBonus::NONE
        },
    },
];

/// Table lookup; `HEROES` is ordered by `HeroId` discriminant
pub fn hero_definition(id: HeroId) -> &'static HeroDefinition {
    &HEROES[id as usize]
}

fn blinding_fog(m: &mut Match, side: Side, now: f64) {
    m.player_mut(side.opponent())
        .add_effect(Effect::new(EffectKind::BlindingFog, EffectScope::Towers, 0.6, now, 6_000.0));
}

fn riptide(m: &mut Match, side: Side, now: f64) {
    m.player_mut(side)
        .add_effect(Effect::new(EffectKind::Riptide, EffectScope::WaterTroops, 1.5, now, 8_000.0));
}

fn veil(m: &mut Match, side: Side, now: f64) {
    let effect = Effect::new(EffectKind::Veil, EffectScope::AllTroops, 1.0, now, 5_000.0);
    let until = effect.ends_at();
    let player = m.player_mut(side);
    for unit in player.units.iter_mut().filter(|u| u.alive) {
        unit.stealth_until_ms = Some(until);
    }
    player.add_effect(effect);
}

fn battle_cry(m: &mut Match, side: Side, now: f64) {
    m.player_mut(side)
        .add_effect(Effect::new(EffectKind::BattleCry, EffectScope::AllTroops, 1.3, now, 8_000.0));
}

fn renewal(m: &mut Match, side: Side, _now: f64) {
    let player = m.player_mut(side);
    player.base_hp = (player.base_hp + player.base_max_hp * 0.2).min(player.base_max_hp);

    let mut revived = Vec::with_capacity(RENEWAL_REVIVES);
    while revived.len() < RENEWAL_REVIVES {
        match player.fallen.pop_back() {
            Some(kind) => revived.push(kind),
            None => break,
        }
    }
    for kind in revived {
        m.spawn_unit(side, kind);
    }
}

fn rapid_deploy(m: &mut Match, side: Side, now: f64) {
    m.player_mut(side)
        .add_effect(Effect::new(EffectKind::RapidDeploy, EffectScope::Deployment, 0.25, now, 10_000.0));
}

impl Match {
    /// Activate the player's hero ability. `None` if the player is not in this match.
    pub fn use_hero_ability(&mut self, player_id: Uuid) -> Option<ActionResult> {
        let side = self.side_of(player_id)?;
        if !self.is_running() {
            return Some(Err(ActionError::MatchFinished));
        }

        let now = self.now_ms();
        let player = self.player(side);
        let remaining = player.ability_cooldown_remaining(now);
        if remaining > 0.0 {
            return Some(Err(ActionError::OnCooldown {
                remaining_ms: remaining.ceil() as u64,
            }));
        }
        if player.energy < ABILITY_ENERGY_COST {
            return Some(Err(ActionError::InsufficientEnergy {
                required: ABILITY_ENERGY_COST,
                available: player.energy,
            }));
        }

        let hero = hero_definition(player.hero);
        let player = self.player_mut(side);
        player.add_energy(-ABILITY_ENERGY_COST);
        player.last_ability_ms = Some(now);
        (hero.active)(self, side, now);

        let cooldown_ms = self.player(side).ability_cooldown_remaining(now).ceil() as u64;
        self.push_event(GameEvent::AbilityUsed {
            player_id,
            hero: hero.id,
            ability: hero.ability_name.to_string(),
        });

        Some(Ok(ActionOk::AbilityUsed {
            hero: hero.id,
            cooldown_ms,
        }))
    }
}
