//! Loadouts, tech-tree bonuses, passive income and coding-submission rewards

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ws::protocol::GameEvent;

use super::abilities::{hero_definition, HeroId};
use super::actions::{ActionError, ActionOk, ActionResult};
use super::catalog::{TowerKind, UnitKind};
use super::state::{Effect, EffectKind, EffectScope, EntityId, Match, Side};
use super::waves;

/// Base score for any passing submission
pub const BASE_SCORE: f32 = 100.0;
/// Gold awarded per score point
pub const GOLD_PER_SCORE: f32 = 2.0;
/// Permanent energy income gained per passing submission (per second)
pub const ENERGY_INCOME_STEP: f32 = 0.1;
/// Chance a passing submission sabotages the opponent
pub const SABOTAGE_CHANCE: f64 = 0.3;
/// Troop speed multiplier while sabotaged
pub const SABOTAGE_SPEED: f32 = 0.75;
/// HP multiplier for troops spawned while sabotaged
pub const SABOTAGE_HP_FACTOR: f32 = 0.85;
pub const SABOTAGE_DURATION_MS: f64 = 10_000.0;
/// Consecutive passes needed for a surge
pub const SURGE_STREAK: u32 = 3;
/// Gold paid for each wave enemy a player's towers kill
pub const ENEMY_BOUNTY: f32 = 5.0;

// ============================================================================
// Tech tree
// ============================================================================

/// Stats a tech upgrade can modify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechStat {
    UnitHp,
    UnitDamage,
    UnitSpeed,
    TowerDamage,
    TowerRange,
    TowerRegen,
    GoldIncome,
    EnergyIncome,
    MaxEnergy,
    BaseHp,
    CooldownReduction,
    Piercing,
    CodingScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechMode {
    Add,
    Multiply,
}

/// One purchased tech-tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechUpgrade {
    pub stat: TechStat,
    pub mode: TechMode,
    pub value: f32,
}

/// Merged tech-tree bonuses. Multipliers default to 1.0, additive fields to 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bonuses {
    pub unit_hp: f32,
    pub unit_damage: f32,
    pub unit_speed: f32,
    pub tower_damage: f32,
    pub tower_range: f32,
    pub tower_regen: f32,
    pub gold_income: f32,
    pub energy_income: f32,
    pub max_energy: f32,
    pub base_hp: f32,
    pub cooldown_reduction: f32,
    pub piercing: f32,
    pub coding_score: f32,
}

impl Default for Bonuses {
    fn default() -> Self {
        Self {
            unit_hp: 1.0,
            unit_damage: 1.0,
            unit_speed: 1.0,
            tower_damage: 1.0,
            tower_range: 1.0,
            tower_regen: 0.0,
            gold_income: 0.0,
            energy_income: 0.0,
            max_energy: 0.0,
            base_hp: 0.0,
            cooldown_reduction: 0.0,
            piercing: 0.0,
            coding_score: 1.0,
        }
    }
}

/// Upper bound on cooldown reduction
const MAX_COOLDOWN_REDUCTION: f32 = 0.75;

impl Bonuses {
    /// Fold upgrades into one record (done once per match at loadout time)
    pub fn from_upgrades(upgrades: &[TechUpgrade]) -> Self {
        let mut bonuses = Self::default();
        for upgrade in upgrades {
            let field = bonuses.field_mut(upgrade.stat);
            match upgrade.mode {
                TechMode::Add => *field += upgrade.value,
                TechMode::Multiply => *field *= upgrade.value,
            }
        }
        bonuses.cooldown_reduction = bonuses.cooldown_reduction.clamp(0.0, MAX_COOLDOWN_REDUCTION);
        bonuses
    }

    fn field_mut(&mut self, stat: TechStat) -> &mut f32 {
        match stat {
            TechStat::UnitHp => &mut self.unit_hp,
            TechStat::UnitDamage => &mut self.unit_damage,
            TechStat::UnitSpeed => &mut self.unit_speed,
            TechStat::TowerDamage => &mut self.tower_damage,
            TechStat::TowerRange => &mut self.tower_range,
            TechStat::TowerRegen => &mut self.tower_regen,
            TechStat::GoldIncome => &mut self.gold_income,
            TechStat::EnergyIncome => &mut self.energy_income,
            TechStat::MaxEnergy => &mut self.max_energy,
            TechStat::BaseHp => &mut self.base_hp,
            TechStat::CooldownReduction => &mut self.cooldown_reduction,
            TechStat::Piercing => &mut self.piercing,
            TechStat::CodingScore => &mut self.coding_score,
        }
    }
}

/// Everything a player brings into a match, resolved by the progression store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loadout {
    pub player_id: Uuid,
    #[serde(default)]
    pub hero: HeroId,
    #[serde(default)]
    pub unlocked_units: Vec<UnitKind>,
    #[serde(default)]
    pub unlocked_towers: Vec<TowerKind>,
    #[serde(default)]
    pub upgrades: Vec<TechUpgrade>,
}

impl Loadout {
    /// Loadout for a player with no progression
    pub fn starter(player_id: Uuid, hero: HeroId) -> Self {
        Self {
            player_id,
            hero,
            unlocked_units: Vec::new(),
            unlocked_towers: Vec::new(),
            upgrades: Vec::new(),
        }
    }

    pub fn bonuses(&self) -> Bonuses {
        Bonuses::from_upgrades(&self.upgrades)
    }

    /// Starter units plus unlocks, without duplicates
    pub fn unit_unlocks(&self) -> Vec<UnitKind> {
        let mut kinds = UnitKind::STARTER.to_vec();
        for kind in &self.unlocked_units {
            if kind.is_deployable() && !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    pub fn tower_unlocks(&self) -> Vec<TowerKind> {
        let mut kinds = TowerKind::STARTER.to_vec();
        for kind in &self.unlocked_towers {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}

// ============================================================================
// Coding submissions
// ============================================================================

/// Verdict from the code judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
    Pass,
    Partial,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn score_multiplier(self) -> f32 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 1.5,
            Difficulty::Hard => 2.0,
        }
    }

    pub fn energy_reward(self) -> f32 {
        match self {
            Difficulty::Easy => 20.0,
            Difficulty::Medium => 35.0,
            Difficulty::Hard => 50.0,
        }
    }

    /// How much sooner the next wave arrives
    pub fn wave_pull_ms(self) -> f64 {
        match self {
            Difficulty::Easy => 2_000.0,
            Difficulty::Medium => 4_000.0,
            Difficulty::Hard => 6_000.0,
        }
    }
}

/// Judge result fed into the match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingSubmission {
    pub status: SubmissionStatus,
    pub difficulty: Difficulty,
    pub execution_time_ms: u64,
    pub problem_id: String,
}

/// Rewards granted (or not) by a submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub passed: bool,
    pub coding_score: f32,
    pub gold_reward: f32,
    pub energy_reward: f32,
    pub wave_time_bonus_ms: u64,
    pub sabotage_applied: bool,
    pub surge_unit: Option<EntityId>,
    pub success_streak: u32,
}

/// Faster solutions earn more
pub fn speed_bonus(execution_time_ms: u64) -> f32 {
    match execution_time_ms {
        0..=49 => 30.0,
        50..=99 => 20.0,
        100..=249 => 10.0,
        _ => 0.0,
    }
}

/// `(base + speedBonus) × difficultyMultiplier`, before hero and tech multipliers
pub fn coding_score(difficulty: Difficulty, execution_time_ms: u64) -> f32 {
    (BASE_SCORE + speed_bonus(execution_time_ms)) * difficulty.score_multiplier()
}

impl Match {
    /// Apply a judge verdict. `None` if the player is not in this match.
    pub fn process_coding_submission(
        &mut self,
        player_id: Uuid,
        submission: &CodingSubmission,
    ) -> Option<ActionResult> {
        let side = self.side_of(player_id)?;
        if !self.is_running() {
            return Some(Err(ActionError::MatchFinished));
        }

        if submission.status != SubmissionStatus::Pass {
            self.player_mut(side).success_streak = 0;
            return Some(Ok(ActionOk::SubmissionProcessed(SubmissionOutcome::default())));
        }

        let now = self.now_ms();
        let player = self.player_mut(side);
        let passive = hero_definition(player.hero).passive;
        let score = coding_score(submission.difficulty, submission.execution_time_ms)
            * passive.coding_score
            * player.bonuses.coding_score;
        let gold = score * GOLD_PER_SCORE;
        let energy = submission.difficulty.energy_reward();

        player.add_gold(gold);
        player.add_energy(energy);
        player.energy_income += ENERGY_INCOME_STEP;
        player.submissions_passed += 1;
        player.success_streak += 1;
        let surge = player.success_streak >= SURGE_STREAK;
        if surge {
            player.success_streak = 0;
        }
        let streak = player.success_streak;

        let wave_bonus = waves::pull_next_wave(self, submission.difficulty.wave_pull_ms());

        let sabotage = self.rng.gen_bool(SABOTAGE_CHANCE);
        if sabotage {
            self.player_mut(side.opponent()).add_effect(Effect::new(
                EffectKind::Sabotage,
                EffectScope::AllTroops,
                SABOTAGE_SPEED,
                now,
                SABOTAGE_DURATION_MS,
            ));
        }

        let surge_unit = surge.then(|| self.spawn_unit(side, UnitKind::Elite));

        self.push_event(GameEvent::SubmissionRewarded {
            player_id,
            problem_id: submission.problem_id.clone(),
            coding_score: score,
            sabotage,
            surge: surge_unit.is_some(),
        });

        Some(Ok(ActionOk::SubmissionProcessed(SubmissionOutcome {
            passed: true,
            coding_score: score,
            gold_reward: gold,
            energy_reward: energy,
            wave_time_bonus_ms: wave_bonus.round() as u64,
            sabotage_applied: sabotage,
            surge_unit,
            success_streak: streak,
        })))
    }
}

/// Passive per-second income, energy capped at the player's maximum
pub(super) fn accrue_income(m: &mut Match, dt: f32) {
    for player in &mut m.players {
        let gold = player.gold_income * dt;
        let energy = player.energy_income * dt;
        player.add_gold(gold);
        player.add_energy(energy);
    }
}

/// Pay a tower owner for a wave kill
pub(super) fn pay_bounty(m: &mut Match, side: Side) {
    let player = m.player_mut(side);
    player.enemies_killed += 1;
    player.add_gold(ENEMY_BOUNTY);
}
