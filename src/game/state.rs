//! Authoritative match state (owned by the match task)

use std::collections::VecDeque;
use std::ops::{Add, Mul, Sub};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ws::protocol::{GameEvent, GameStateView};

use super::abilities::{hero_definition, HeroId};
use super::catalog::{Element, TowerKind, UnitKind, UnitStats, ARENA_WIDTH, BASE_A, BASE_B};
use super::economy::{Bonuses, Loadout, SABOTAGE_HP_FACTOR};
use super::snapshot::SnapshotBuilder;
use super::{combat, economy, waves};

/// Match-scoped entity id (units, towers, projectiles, enemies share one counter)
pub type EntityId = u32;

/// How many fallen unit types are remembered for revives
const FALLEN_HISTORY: usize = 5;

/// 2D position / direction in world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// Linear blend, exact at `t = 0` and `t = 1`
    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2::new(
            self.x * (1.0 - t) + other.x * t,
            self.y * (1.0 - t) + other.y * t,
        )
    }

    /// Step toward `target` by at most `max_step`, never overshooting
    pub fn move_towards(self, target: Vec2, max_step: f32) -> Vec2 {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_step || dist <= f32::EPSILON {
            target
        } else {
            self + delta * (max_step / dist)
        }
    }

    /// Heading in radians from this point to `other`
    pub fn heading_to(self, other: Vec2) -> f32 {
        let d = other - self;
        d.y.atan2(d.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Which end of the arena a player defends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn base_position(self) -> Vec2 {
        match self {
            Side::A => BASE_A,
            Side::B => BASE_B,
        }
    }

    /// +1 when the opponent is to the right, -1 otherwise
    pub fn toward_opponent(self) -> f32 {
        match self {
            Side::A => 1.0,
            Side::B => -1.0,
        }
    }

    /// Whether a position lies on this side's half of the arena
    pub fn owns_position(self, pos: Vec2) -> bool {
        match self {
            Side::A => pos.x <= ARENA_WIDTH / 2.0,
            Side::B => pos.x >= ARENA_WIDTH / 2.0,
        }
    }
}

/// Match lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Running,
    Finished,
}

/// Ability / debuff effect tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    BlindingFog,
    Riptide,
    Veil,
    BattleCry,
    RapidDeploy,
    Sabotage,
}

/// What an effect applies to on the player carrying it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectScope {
    Towers,
    AllTroops,
    WaterTroops,
    Deployment,
}

impl EffectScope {
    fn covers(self, element: Element) -> bool {
        match self {
            EffectScope::WaterTroops => element == Element::Water,
            _ => true,
        }
    }
}

/// Stats that effects can scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    TowerRange,
    TroopSpeed,
    TroopDamage,
    SpawnHp,
    DeployCooldown,
}

/// Timed effect on a player. Visible only while `now - start < duration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub scope: EffectScope,
    pub strength: f32,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl Effect {
    pub fn new(kind: EffectKind, scope: EffectScope, strength: f32, start_ms: f64, duration_ms: f64) -> Self {
        Self {
            kind,
            scope,
            strength,
            start_ms,
            duration_ms,
        }
    }

    pub fn is_active(&self, now_ms: f64) -> bool {
        let elapsed = now_ms - self.start_ms;
        elapsed >= 0.0 && elapsed < self.duration_ms
    }

    pub fn ends_at(&self) -> f64 {
        self.start_ms + self.duration_ms
    }

    /// Multiplier this effect contributes to `stat` for a troop of `element`
    pub fn factor(&self, stat: Stat, element: Element) -> Option<f32> {
        let factor = match (self.kind, stat) {
            (EffectKind::BlindingFog, Stat::TowerRange)
            | (EffectKind::Riptide, Stat::TroopSpeed)
            | (EffectKind::BattleCry, Stat::TroopDamage)
            | (EffectKind::RapidDeploy, Stat::DeployCooldown)
            | (EffectKind::Sabotage, Stat::TroopSpeed) => self.strength,
            (EffectKind::Sabotage, Stat::SpawnHp) => SABOTAGE_HP_FACTOR,
            _ => return None,
        };
        self.scope.covers(element).then_some(factor)
    }
}

/// Slow applied by a frost hit, reverted by the tick sweep
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlowStatus {
    pub factor: f32,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl SlowStatus {
    pub fn is_active(&self, now_ms: f64) -> bool {
        now_ms - self.start_ms < self.duration_ms
    }
}

/// A deployed troop marching on the opponent's base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: EntityId,
    pub owner: Uuid,
    pub kind: UnitKind,
    pub element: Element,
    pub hp: f32,
    pub max_hp: f32,
    pub damage: f32,
    pub speed: f32,
    pub attack_speed: f32,
    pub range: f32,
    pub armor: f32,
    pub position: Vec2,
    pub target: Vec2,
    pub alive: bool,
    #[serde(skip)]
    pub last_attack_ms: Option<f64>,
    /// Hidden from tower targeting until this time
    pub stealth_until_ms: Option<f64>,
    /// Extra damage fraction against towers
    pub piercing: f32,
    pub slow: Option<SlowStatus>,
}

impl Unit {
    pub fn is_stealthed(&self, now_ms: f64) -> bool {
        self.stealth_until_ms.is_some_and(|until| now_ms < until)
    }

    pub fn slow_factor(&self, now_ms: f64) -> f32 {
        match self.slow {
            Some(slow) if slow.is_active(now_ms) => slow.factor,
            _ => 1.0,
        }
    }
}

/// A placed defensive tower
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tower {
    pub id: EntityId,
    pub owner: Uuid,
    pub kind: TowerKind,
    pub position: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub damage: f32,
    pub range: f32,
    pub fire_rate: f32,
    pub splash_radius: Option<f32>,
    pub chain_count: u32,
    pub slow_on_hit: Option<f32>,
    pub beam: bool,
    pub regen_per_sec: f32,
    pub alive: bool,
    #[serde(skip)]
    pub last_shot_ms: Option<f64>,
}

/// What a projectile is homing on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TargetRef {
    Unit(EntityId),
    Enemy(EntityId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: Uuid,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    pub target: TargetRef,
    pub splash_radius: Option<f32>,
    pub chain_count: u32,
    pub slow: Option<f32>,
}

/// Wave mob. `lane` is the side whose base it attacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EntityId,
    pub lane: Side,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    pub damage: f32,
    pub position: Vec2,
    pub target: Vec2,
    pub alive: bool,
    pub slow: Option<SlowStatus>,
}

impl Enemy {
    pub fn slow_factor(&self, now_ms: f64) -> f32 {
        match self.slow {
            Some(slow) if slow.is_active(now_ms) => slow.factor,
            _ => 1.0,
        }
    }
}

/// Simulation tuning shared by every match
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub tick_rate: u32,
    pub wave_interval_ms: f64,
    pub first_wave_delay_ms: f64,
    pub starting_gold: f32,
    pub starting_energy: f32,
    pub max_energy: f32,
    pub gold_income: f32,
    pub energy_income: f32,
    pub base_hp: f32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            tick_rate: crate::util::time::SIMULATION_TPS,
            wave_interval_ms: 30_000.0,
            first_wave_delay_ms: 20_000.0,
            starting_gold: 300.0,
            starting_energy: 50.0,
            max_energy: 100.0,
            gold_income: 5.0,
            energy_income: 2.0,
            base_hp: 1000.0,
        }
    }
}

/// Per-player authoritative state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub player_id: Uuid,
    pub side: Side,
    pub hero: HeroId,
    pub bonuses: Bonuses,
    pub unlocked_units: Vec<UnitKind>,
    pub unlocked_towers: Vec<TowerKind>,

    // Economy
    pub gold: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub gold_income: f32,
    pub energy_income: f32,

    // Base
    pub base_hp: f32,
    pub base_max_hp: f32,
    pub base_position: Vec2,

    // Entities
    pub units: Vec<Unit>,
    pub towers: Vec<Tower>,
    pub effects: Vec<Effect>,

    // Stats
    pub units_killed: u32,
    pub towers_destroyed: u32,
    pub enemies_killed: u32,
    pub submissions_passed: u32,
    pub success_streak: u32,

    // Timers
    pub last_ability_ms: Option<f64>,
    pub last_deploy_ms: Option<f64>,
    pub fallen: VecDeque<UnitKind>,

    // Commander avatar (client-predicted movement)
    pub commander: Vec2,
    pub last_input_seq: u32,
}

impl PlayerState {
    pub fn new(loadout: &Loadout, side: Side, settings: &MatchSettings) -> Self {
        let bonuses = loadout.bonuses();
        let passive = hero_definition(loadout.hero).passive;
        let base_max_hp = (settings.base_hp + bonuses.base_hp) * passive.base_hp;
        let max_energy = settings.max_energy + bonuses.max_energy;

        Self {
            player_id: loadout.player_id,
            side,
            hero: loadout.hero,
            unlocked_units: loadout.unit_unlocks(),
            unlocked_towers: loadout.tower_unlocks(),
            gold: settings.starting_gold,
            energy: settings.starting_energy.min(max_energy),
            max_energy,
            gold_income: settings.gold_income + bonuses.gold_income,
            energy_income: (settings.energy_income + bonuses.energy_income) * passive.energy_income,
            base_hp: base_max_hp,
            base_max_hp,
            base_position: side.base_position(),
            units: Vec::new(),
            towers: Vec::new(),
            effects: Vec::new(),
            units_killed: 0,
            towers_destroyed: 0,
            enemies_killed: 0,
            submissions_passed: 0,
            success_streak: 0,
            last_ability_ms: None,
            last_deploy_ms: None,
            fallen: VecDeque::with_capacity(FALLEN_HISTORY),
            commander: side.base_position(),
            last_input_seq: 0,
            bonuses,
        }
    }

    /// Product of all active effect multipliers for `stat`
    pub fn effect_factor(&self, now_ms: f64, stat: Stat, element: Element) -> f32 {
        self.effects
            .iter()
            .filter(|e| e.is_active(now_ms))
            .filter_map(|e| e.factor(stat, element))
            .product()
    }

    pub fn has_active_effect(&self, kind: EffectKind, now_ms: f64) -> bool {
        self.effects.iter().any(|e| e.kind == kind && e.is_active(now_ms))
    }

    /// Latest end time among active effects of `kind`
    pub fn effect_ends_at(&self, kind: EffectKind, now_ms: f64) -> Option<f64> {
        self.effects
            .iter()
            .filter(|e| e.kind == kind && e.is_active(now_ms))
            .map(Effect::ends_at)
            .reduce(f64::max)
    }

    /// Add an effect, refreshing any existing effect of the same kind
    pub fn add_effect(&mut self, effect: Effect) {
        self.effects.retain(|e| e.kind != effect.kind);
        self.effects.push(effect);
    }

    pub fn purge_expired_effects(&mut self, now_ms: f64) {
        self.effects.retain(|e| e.is_active(now_ms));
    }

    pub fn add_gold(&mut self, amount: f32) {
        self.gold = (self.gold + amount).max(0.0);
    }

    pub fn add_energy(&mut self, amount: f32) {
        self.energy = (self.energy + amount).clamp(0.0, self.max_energy);
    }

    /// Remaining active-ability cooldown, floored at zero
    pub fn ability_cooldown_remaining(&self, now_ms: f64) -> f64 {
        let Some(last) = self.last_ability_ms else {
            return 0.0;
        };
        let cooldown = hero_definition(self.hero).cooldown_ms
            * (1.0 - self.bonuses.cooldown_reduction as f64);
        (cooldown - (now_ms - last)).max(0.0)
    }

    pub fn record_fallen(&mut self, kind: UnitKind) {
        if self.fallen.len() == FALLEN_HISTORY {
            self.fallen.pop_front();
        }
        self.fallen.push_back(kind);
    }

    pub fn live_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.alive)
    }

    pub fn live_towers(&self) -> impl Iterator<Item = &Tower> {
        self.towers.iter().filter(|t| t.alive)
    }
}

/// One live 1v1 match
#[derive(Debug, Clone)]
pub struct Match {
    pub id: Uuid,
    pub players: [PlayerState; 2],
    pub wave: u32,
    pub next_wave_ms: f64,
    pub projectiles: Vec<Projectile>,
    pub enemies: Vec<Enemy>,
    pub status: MatchStatus,
    pub winner: Option<Uuid>,
    pub tick: u64,
    /// Simulated time since creation (sum of tick deltas)
    pub elapsed_ms: f64,
    pub settings: MatchSettings,
    pub(crate) events: Vec<GameEvent>,
    next_entity_id: EntityId,
    pub(crate) rng: ChaCha8Rng,
}

impl Match {
    /// Create a match from two resolved loadouts
    pub fn new(id: Uuid, loadout_a: &Loadout, loadout_b: &Loadout, settings: MatchSettings, seed: u64) -> Self {
        Self {
            id,
            players: [
                PlayerState::new(loadout_a, Side::A, &settings),
                PlayerState::new(loadout_b, Side::B, &settings),
            ],
            wave: 0,
            next_wave_ms: settings.first_wave_delay_ms,
            projectiles: Vec::new(),
            enemies: Vec::new(),
            status: MatchStatus::Running,
            winner: None,
            tick: 0,
            elapsed_ms: 0.0,
            settings,
            events: Vec::new(),
            next_entity_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn is_running(&self) -> bool {
        self.status == MatchStatus::Running
    }

    pub fn side_of(&self, player_id: Uuid) -> Option<Side> {
        self.players
            .iter()
            .find(|p| p.player_id == player_id)
            .map(|p| p.side)
    }

    pub fn player(&self, side: Side) -> &PlayerState {
        &self.players[side.index()]
    }

    pub fn player_mut(&mut self, side: Side) -> &mut PlayerState {
        &mut self.players[side.index()]
    }

    /// Mutable access to (`side`, opponent) at once
    pub fn players_mut(&mut self, side: Side) -> (&mut PlayerState, &mut PlayerState) {
        let [a, b] = &mut self.players;
        match side {
            Side::A => (a, b),
            Side::B => (b, a),
        }
    }

    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Spawn a unit for `side`, applying tech bonuses, hero passive and live effects
    pub fn spawn_unit(&mut self, side: Side, kind: UnitKind) -> EntityId {
        let id = self.next_entity_id();
        let now = self.now_ms();
        let jitter = self.rng.gen_range(-40.0..40.0);
        let stats = UnitStats::for_kind(kind);
        let player = self.player_mut(side);
        let passive = hero_definition(player.hero).passive;
        let bonuses = &player.bonuses;

        let mut hp = stats.hp * bonuses.unit_hp * player.effect_factor(now, Stat::SpawnHp, stats.element);
        if stats.element == Element::Water {
            hp *= passive.water_unit_hp;
        }

        let spawn = player.base_position + Vec2::new(side.toward_opponent() * 40.0, jitter);
        let unit = Unit {
            id,
            owner: player.player_id,
            kind,
            element: stats.element,
            hp,
            max_hp: hp,
            damage: stats.damage * bonuses.unit_damage,
            speed: stats.speed * bonuses.unit_speed * passive.unit_speed,
            attack_speed: stats.attack_speed,
            range: stats.range,
            armor: stats.armor,
            position: spawn,
            target: side.opponent().base_position(),
            alive: true,
            last_attack_ms: None,
            stealth_until_ms: player.effect_ends_at(EffectKind::Veil, now),
            piercing: bonuses.piercing,
            slow: None,
        };
        player.units.push(unit);
        id
    }

    /// Damage a base; the first base to reach zero ends the match
    pub fn damage_base(&mut self, side: Side, amount: f32) {
        let player = self.player_mut(side);
        player.base_hp = (player.base_hp - amount).max(0.0);
        let defeated = player.base_hp <= 0.0;
        let player_id = player.player_id;
        let base_hp = player.base_hp;

        self.push_event(GameEvent::BaseDamaged {
            player_id,
            damage: amount,
            base_hp,
        });

        if defeated && self.is_running() {
            self.finish(side.opponent());
        }
    }

    /// Disconnect / surrender: the other player wins. Returns false if not applicable.
    pub fn forfeit(&mut self, player_id: Uuid) -> bool {
        match self.side_of(player_id) {
            Some(side) if self.is_running() => {
                self.finish(side.opponent());
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, winner: Side) {
        let winner_id = self.player(winner).player_id;
        self.status = MatchStatus::Finished;
        self.winner = Some(winner_id);
        self.push_event(GameEvent::MatchFinished { winner: winner_id });
    }

    /// Advance the simulation by one fixed step and return the broadcast view
    pub fn update_game_state(&mut self, dt: f32) -> GameStateView {
        if self.is_running() {
            self.tick += 1;
            self.elapsed_ms += dt as f64 * 1000.0;
            let now = self.now_ms();

            for player in &mut self.players {
                player.purge_expired_effects(now);
            }

            economy::accrue_income(self, dt);
            waves::run(self);
            combat::resolve(self, dt);
            combat::sweep(self, dt);
        }

        let events = self.drain_events();
        SnapshotBuilder::view(self, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::test_match;

    fn place_attacker(m: &mut Match, side: Side, damage: f32) {
        let id = m.spawn_unit(side, UnitKind::Soldier);
        let target = side.opponent().base_position();
        let unit = m
            .player_mut(side)
            .units
            .iter_mut()
            .find(|u| u.id == id)
            .unwrap();
        unit.damage = damage;
        unit.position = target + Vec2::new(1.0, 0.0);
    }

    #[test]
    fn vec2_move_towards_does_not_overshoot() {
        let p = Vec2::new(0.0, 0.0).move_towards(Vec2::new(3.0, 4.0), 10.0);
        assert_eq!(p, Vec2::new(3.0, 4.0));
        let q = Vec2::new(0.0, 0.0).move_towards(Vec2::new(3.0, 4.0), 2.5);
        assert!((q.length() - 2.5).abs() < 1e-5);
    }

    #[test]
    fn effect_visibility_window_is_half_open() {
        let e = Effect::new(EffectKind::BattleCry, EffectScope::AllTroops, 1.3, 1000.0, 500.0);
        assert!(!e.is_active(999.0));
        assert!(e.is_active(1000.0));
        assert!(e.is_active(1499.9));
        assert!(!e.is_active(1500.0));
    }

    #[test]
    fn water_scoped_effect_ignores_other_elements() {
        let e = Effect::new(EffectKind::Riptide, EffectScope::WaterTroops, 1.5, 0.0, 1000.0);
        assert_eq!(e.factor(Stat::TroopSpeed, Element::Water), Some(1.5));
        assert_eq!(e.factor(Stat::TroopSpeed, Element::Fire), None);
        assert_eq!(e.factor(Stat::TroopDamage, Element::Water), None);
    }

    #[test]
    fn expired_effects_are_purged_on_tick() {
        let mut m = test_match();
        m.player_mut(Side::A)
            .add_effect(Effect::new(EffectKind::BattleCry, EffectScope::AllTroops, 1.3, 0.0, 100.0));
        m.update_game_state(0.05);
        assert_eq!(m.player(Side::A).effects.len(), 1);
        m.update_game_state(0.06);
        assert!(m.player(Side::A).effects.is_empty());
    }

    #[test]
    fn entity_ids_are_unique() {
        let mut m = test_match();
        let a = m.spawn_unit(Side::A, UnitKind::Soldier);
        let b = m.spawn_unit(Side::B, UnitKind::Soldier);
        let c = m.next_entity_id();
        assert!(a != b && b != c && a != c);
    }

    #[test]
    fn base_hits_accumulate_then_end_match() {
        let mut m = test_match();
        assert_eq!(m.player(Side::A).base_hp, 1000.0);

        for _ in 0..3 {
            place_attacker(&mut m, Side::B, 50.0);
        }
        m.update_game_state(1.0 / 60.0);
        assert_eq!(m.player(Side::A).base_hp, 850.0);
        assert_eq!(m.status, MatchStatus::Running);
        assert!(m.player(Side::B).units.is_empty());

        place_attacker(&mut m, Side::B, 900.0);
        m.update_game_state(1.0 / 60.0);
        assert_eq!(m.player(Side::A).base_hp, 0.0);
        assert_eq!(m.status, MatchStatus::Finished);
        assert_eq!(m.winner, Some(m.player(Side::B).player_id));
    }

    #[test]
    fn finished_match_does_not_advance() {
        let mut m = test_match();
        let a = m.player(Side::A).player_id;
        assert!(m.forfeit(a));
        let tick = m.tick;
        m.update_game_state(1.0);
        assert_eq!(m.tick, tick);
        assert!(!m.forfeit(a));
        assert_eq!(m.winner, Some(m.player(Side::B).player_id));
    }

    #[test]
    fn resources_never_go_negative_over_a_long_match() {
        let mut m = test_match();
        m.settings.wave_interval_ms = 2_000.0;
        m.next_wave_ms = 0.0;
        for _ in 0..5 {
            m.spawn_unit(Side::A, UnitKind::Knight);
            m.spawn_unit(Side::B, UnitKind::Archer);
        }
        for _ in 0..(60 * 30) {
            m.update_game_state(1.0 / 60.0);
            for p in &m.players {
                assert!(p.gold >= 0.0 && p.energy >= 0.0 && p.base_hp >= 0.0);
                assert!(p.units.iter().all(|u| u.hp >= 0.0));
                assert!(p.towers.iter().all(|t| t.hp >= 0.0));
            }
            assert!(m.enemies.iter().all(|e| e.hp >= 0.0));
        }
    }
}
