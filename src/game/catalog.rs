//! Static unit and tower definitions plus arena geometry

use std::str::FromStr;

use serde::de::{value, DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};

use super::state::Vec2;

/// Arena width in world units (side A defends the left edge)
pub const ARENA_WIDTH: f32 = 1200.0;
/// Arena height in world units
pub const ARENA_HEIGHT: f32 = 600.0;
/// Distance of each base from its arena edge
pub const BASE_INSET: f32 = 60.0;

/// Base position for side A
pub const BASE_A: Vec2 = Vec2::new(BASE_INSET, ARENA_HEIGHT / 2.0);
/// Base position for side B
pub const BASE_B: Vec2 = Vec2::new(ARENA_WIDTH - BASE_INSET, ARENA_HEIGHT / 2.0);

/// Troop element, used by element-scoped effects and passives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    #[default]
    Neutral,
    Fire,
    Water,
    Earth,
}

/// Deployable unit types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Cheap melee line unit
    Soldier,
    /// Ranged skirmisher
    Archer,
    /// Armored melee
    Knight,
    /// Fire caster with long range
    Pyromancer,
    /// Fast water skirmisher
    Naiad,
    /// Slow earth siege unit
    Golem,
    /// Granted by a submission surge, never purchasable
    Elite,
}

impl UnitKind {
    /// Units every player owns without progression unlocks
    pub const STARTER: [UnitKind; 2] = [UnitKind::Soldier, UnitKind::Archer];

    pub fn is_deployable(self) -> bool {
        self != UnitKind::Elite
    }
}

impl FromStr for UnitKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_wire_name(s)
    }
}

/// Base stats and costs per unit type (before bonuses)
#[derive(Debug, Clone, Copy)]
pub struct UnitStats {
    pub hp: f32,
    pub damage: f32,
    /// World units per second
    pub speed: f32,
    /// Attacks per second
    pub attack_speed: f32,
    pub range: f32,
    pub armor: f32,
    pub element: Element,
    pub gold_cost: f32,
    pub energy_cost: f32,
}

impl UnitStats {
    pub fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Soldier => Self {
                hp: 120.0,
                damage: 15.0,
                speed: 40.0,
                attack_speed: 1.0,
                range: 30.0,
                armor: 2.0,
                element: Element::Neutral,
                gold_cost: 50.0,
                energy_cost: 10.0,
            },
            UnitKind::Archer => Self {
                hp: 80.0,
                damage: 12.0,
                speed: 45.0,
                attack_speed: 1.2,
                range: 120.0,
                armor: 0.0,
                element: Element::Neutral,
                gold_cost: 60.0,
                energy_cost: 15.0,
            },
            UnitKind::Knight => Self {
                hp: 250.0,
                damage: 25.0,
                speed: 30.0,
                attack_speed: 0.8,
                range: 30.0,
                armor: 8.0,
                element: Element::Neutral,
                gold_cost: 120.0,
                energy_cost: 25.0,
            },
            UnitKind::Pyromancer => Self {
                hp: 90.0,
                damage: 30.0,
                speed: 38.0,
                attack_speed: 0.7,
                range: 100.0,
                armor: 1.0,
                element: Element::Fire,
                gold_cost: 100.0,
                energy_cost: 25.0,
            },
            UnitKind::Naiad => Self {
                hp: 100.0,
                damage: 14.0,
                speed: 55.0,
                attack_speed: 1.1,
                range: 60.0,
                armor: 2.0,
                element: Element::Water,
                gold_cost: 80.0,
                energy_cost: 20.0,
            },
            UnitKind::Golem => Self {
                hp: 400.0,
                damage: 35.0,
                speed: 22.0,
                attack_speed: 0.5,
                range: 35.0,
                armor: 12.0,
                element: Element::Earth,
                gold_cost: 180.0,
                energy_cost: 40.0,
            },
            UnitKind::Elite => Self {
                hp: 500.0,
                damage: 60.0,
                speed: 40.0,
                attack_speed: 1.0,
                range: 40.0,
                armor: 10.0,
                element: Element::Neutral,
                gold_cost: 0.0,
                energy_cost: 0.0,
            },
        }
    }
}

/// Placeable tower types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerKind {
    /// Fast single-target shooter
    Arrow,
    /// Slow splash damage
    Cannon,
    /// Slows whatever it hits
    Frost,
    /// Hits bounce between nearby targets
    Tesla,
    /// Continuous beam, no projectile
    Laser,
}

impl TowerKind {
    /// Towers every player owns without progression unlocks
    pub const STARTER: [TowerKind; 2] = [TowerKind::Arrow, TowerKind::Cannon];
}

impl FromStr for TowerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_wire_name(s)
    }
}

/// Base stats and cost per tower type (before bonuses)
#[derive(Debug, Clone, Copy)]
pub struct TowerStats {
    pub hp: f32,
    /// Per projectile, or per second for beam towers
    pub damage: f32,
    pub range: f32,
    /// Shots per second (ignored by beam towers)
    pub fire_rate: f32,
    pub splash_radius: Option<f32>,
    pub chain_count: u32,
    /// Speed multiplier applied to units hit
    pub slow_on_hit: Option<f32>,
    pub beam: bool,
    pub gold_cost: f32,
}

impl TowerStats {
    pub fn for_kind(kind: TowerKind) -> Self {
        match kind {
            TowerKind::Arrow => Self {
                hp: 300.0,
                damage: 20.0,
                range: 150.0,
                fire_rate: 2.0,
                splash_radius: None,
                chain_count: 0,
                slow_on_hit: None,
                beam: false,
                gold_cost: 100.0,
            },
            TowerKind::Cannon => Self {
                hp: 400.0,
                damage: 40.0,
                range: 130.0,
                fire_rate: 0.6,
                splash_radius: Some(50.0),
                chain_count: 0,
                slow_on_hit: None,
                beam: false,
                gold_cost: 175.0,
            },
            TowerKind::Frost => Self {
                hp: 300.0,
                damage: 10.0,
                range: 140.0,
                fire_rate: 1.0,
                splash_radius: None,
                chain_count: 0,
                slow_on_hit: Some(0.5),
                beam: false,
                gold_cost: 150.0,
            },
            TowerKind::Tesla => Self {
                hp: 300.0,
                damage: 25.0,
                range: 120.0,
                fire_rate: 0.8,
                splash_radius: None,
                chain_count: 3,
                slow_on_hit: None,
                beam: false,
                gold_cost: 200.0,
            },
            TowerKind::Laser => Self {
                hp: 350.0,
                damage: 30.0,
                range: 110.0,
                fire_rate: 0.0,
                splash_radius: None,
                chain_count: 0,
                slow_on_hit: None,
                beam: true,
                gold_cost: 250.0,
            },
        }
    }
}

/// Whether a position lies inside the arena
pub fn in_bounds(pos: Vec2) -> bool {
    (0.0..=ARENA_WIDTH).contains(&pos.x) && (0.0..=ARENA_HEIGHT).contains(&pos.y)
}

/// Parse a kind from the same snake_case name serde writes
fn from_wire_name<T: DeserializeOwned>(name: &str) -> Result<T, ()> {
    T::deserialize(name.into_deserializer()).map_err(|_: value::Error| ())
}

/// Nearest point inside the arena
pub fn clamp_to_arena(pos: Vec2) -> Vec2 {
    Vec2::new(pos.x.clamp(0.0, ARENA_WIDTH), pos.y.clamp(0.0, ARENA_HEIGHT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elite_is_not_deployable() {
        assert!(!UnitKind::Elite.is_deployable());
        assert!(UnitKind::STARTER.iter().all(|k| k.is_deployable()));
    }

    #[test]
    fn laser_is_the_only_beam_tower() {
        let beams: Vec<_> = [
            TowerKind::Arrow,
            TowerKind::Cannon,
            TowerKind::Frost,
            TowerKind::Tesla,
            TowerKind::Laser,
        ]
        .into_iter()
        .filter(|k| TowerStats::for_kind(*k).beam)
        .collect();
        assert_eq!(beams, vec![TowerKind::Laser]);
    }

    #[test]
    fn kinds_parse_from_wire_names() {
        assert_eq!("naiad".parse::<UnitKind>(), Ok(UnitKind::Naiad));
        assert_eq!("tesla".parse::<TowerKind>(), Ok(TowerKind::Tesla));
        assert!("dragon".parse::<UnitKind>().is_err());
        assert!("Soldier".parse::<UnitKind>().is_err());
    }

    #[test]
    fn wire_names_match_serialized_names() {
        for kind in [
            UnitKind::Soldier,
            UnitKind::Archer,
            UnitKind::Knight,
            UnitKind::Pyromancer,
            UnitKind::Naiad,
            UnitKind::Golem,
            UnitKind::Elite,
        ] {
            let name = serde_json::to_value(kind).unwrap();
            assert_eq!(name.as_str().unwrap().parse::<UnitKind>(), Ok(kind));
        }
        for kind in [
            TowerKind::Arrow,
            TowerKind::Cannon,
            TowerKind::Frost,
            TowerKind::Tesla,
            TowerKind::Laser,
        ] {
            let name = serde_json::to_value(kind).unwrap();
            assert_eq!(name.as_str().unwrap().parse::<TowerKind>(), Ok(kind));
        }
    }

    #[test]
    fn bases_sit_inside_the_arena() {
        assert!(in_bounds(BASE_A));
        assert!(in_bounds(BASE_B));
        assert!(!in_bounds(Vec2::new(-1.0, 10.0)));
    }
}
