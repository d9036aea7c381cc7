//! Combat system - targeting, projectiles, damage, status effects

use crate::ws::protocol::GameEvent;

use super::catalog::{in_bounds, Element};
use super::economy;
use super::state::{Match, PlayerState, Projectile, Side, SlowStatus, Stat, TargetRef, Vec2};

/// Projectile travel speed (world units per second)
pub const PROJECTILE_SPEED: f32 = 400.0;
/// Distance at which a projectile counts as a hit
pub const PROJECTILE_HIT_RADIUS: f32 = 12.0;
/// Fraction of damage dealt to splash victims
pub const SPLASH_FACTOR: f32 = 0.5;
/// Maximum distance of one chain hop
pub const CHAIN_RANGE: f32 = 100.0;
/// Damage kept per chain hop
pub const CHAIN_FACTOR: f32 = 0.7;
pub const SLOW_DURATION_MS: f64 = 2_000.0;
/// Distance to a base that counts as reaching it
pub const BASE_REACH: f32 = 2.0;

/// What a unit is fighting, by index into the opponent's vectors
#[derive(Debug, Clone, Copy, PartialEq)]
enum Engagement {
    Unit(usize),
    Tower(usize),
}

/// Stateless combat math
pub struct CombatSystem;

impl CombatSystem {
    /// Whether `1 / rate` seconds have passed since the last shot. First shot is free.
    pub fn can_fire(last_ms: Option<f64>, rate: f32, now_ms: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        match last_ms {
            None => true,
            Some(last) => now_ms - last >= 1000.0 / rate as f64,
        }
    }

    /// `max(1, raw - armor)`
    pub fn hit_damage(raw: f32, armor: f32) -> f32 {
        (raw - armor).max(1.0)
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }

    /// Nearest candidate within `range`; ties keep the earlier candidate
    pub fn nearest(from: Vec2, range: f32, candidates: &[(TargetRef, Vec2)]) -> Option<(TargetRef, Vec2)> {
        let mut best: Option<(TargetRef, Vec2, f32)> = None;
        for &(target, pos) in candidates {
            let dist = from.distance(pos);
            if dist > range {
                continue;
            }
            if best.map_or(true, |(_, _, d)| dist < d) {
                best = Some((target, pos, dist));
            }
        }
        best.map(|(target, pos, _)| (target, pos))
    }

    /// Nearest opposing unit, then tower, in range of a unit at `from`
    fn engagement(from: Vec2, range: f32, opp: &PlayerState) -> Option<Engagement> {
        let mut best: Option<(Engagement, f32)> = None;
        let units = opp
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.alive)
            .map(|(i, u)| (Engagement::Unit(i), u.position));
        let towers = opp
            .towers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, t)| (Engagement::Tower(i), t.position));

        for (target, pos) in units.chain(towers) {
            let dist = from.distance(pos);
            if dist <= range && best.map_or(true, |(_, d)| dist < d) {
                best = Some((target, dist));
            }
        }
        best.map(|(target, _)| target)
    }
}

/// Everything a tower owned by `side` may shoot: visible opponent units, then wave
/// enemies attacking `side`
fn tower_targets(m: &Match, side: Side, now: f64) -> Vec<(TargetRef, Vec2)> {
    let units = m
        .player(side.opponent())
        .units
        .iter()
        .filter(|u| u.alive && !u.is_stealthed(now))
        .map(|u| (TargetRef::Unit(u.id), u.position));
    let enemies = m
        .enemies
        .iter()
        .filter(|e| e.alive && e.lane == side)
        .map(|e| (TargetRef::Enemy(e.id), e.position));
    units.chain(enemies).collect()
}

fn target_position(m: &Match, attacker: Side, target: TargetRef) -> Option<Vec2> {
    match target {
        TargetRef::Unit(id) => m
            .player(attacker.opponent())
            .units
            .iter()
            .find(|u| u.id == id && u.alive)
            .map(|u| u.position),
        TargetRef::Enemy(id) => m
            .enemies
            .iter()
            .find(|e| e.id == id && e.alive)
            .map(|e| e.position),
    }
}

/// Tower-side damage (projectile, splash, chain, beam). Returns true on a kill.
fn strike(m: &mut Match, attacker: Side, target: TargetRef, amount: f32, slow: Option<f32>, now: f64) -> bool {
    let slow = slow.map(|factor| SlowStatus {
        factor,
        start_ms: now,
        duration_ms: SLOW_DURATION_MS,
    });

    match target {
        TargetRef::Unit(id) => {
            let (own, opp) = m.players_mut(attacker);
            let Some(unit) = opp.units.iter_mut().find(|u| u.id == id && u.alive) else {
                return false;
            };
            let (hp, dead) = CombatSystem::apply_damage(unit.hp, amount);
            unit.hp = hp;
            if slow.is_some() {
                unit.slow = slow;
            }
            if !dead {
                return false;
            }
            unit.alive = false;
            let (kind, owner) = (unit.kind, unit.owner);
            opp.record_fallen(kind);
            own.units_killed += 1;
            let killer = own.player_id;
            m.push_event(GameEvent::UnitKilled {
                unit_id: id,
                owner,
                killer,
            });
            true
        }
        TargetRef::Enemy(id) => {
            let Some(enemy) = m.enemies.iter_mut().find(|e| e.id == id && e.alive) else {
                return false;
            };
            let (hp, dead) = CombatSystem::apply_damage(enemy.hp, amount);
            enemy.hp = hp;
            if slow.is_some() {
                enemy.slow = slow;
            }
            if !dead {
                return false;
            }
            enemy.alive = false;
            economy::pay_bounty(m, attacker);
            let killer = m.player(attacker).player_id;
            m.push_event(GameEvent::EnemyKilled { enemy_id: id, killer });
            true
        }
    }
}

fn fire_towers(m: &mut Match, dt: f32, now: f64) {
    for side in [Side::A, Side::B] {
        let mut targets = tower_targets(m, side, now);
        let range_factor = m.player(side).effect_factor(now, Stat::TowerRange, Element::Neutral);
        let owner = m.player(side).player_id;

        for i in 0..m.player(side).towers.len() {
            let tower = &m.player(side).towers[i];
            if !tower.alive {
                continue;
            }
            if !tower.beam && !CombatSystem::can_fire(tower.last_shot_ms, tower.fire_rate, now) {
                continue;
            }
            let Some((target, target_pos)) =
                CombatSystem::nearest(tower.position, tower.range * range_factor, &targets)
            else {
                continue;
            };

            if tower.beam {
                let damage = tower.damage * dt;
                if strike(m, side, target, damage, None, now) {
                    targets = tower_targets(m, side, now);
                }
                continue;
            }

            let projectile = Projectile {
                id: 0,
                owner,
                position: tower.position,
                velocity: (target_pos - tower.position).normalized() * PROJECTILE_SPEED,
                damage: tower.damage,
                target,
                splash_radius: tower.splash_radius,
                chain_count: tower.chain_count,
                slow: tower.slow_on_hit,
            };
            let id = m.next_entity_id();
            m.player_mut(side).towers[i].last_shot_ms = Some(now);
            m.projectiles.push(Projectile { id, ..projectile });
        }
    }
}

fn impact(m: &mut Match, side: Side, projectile: &Projectile, at: Vec2, now: f64) {
    strike(m, side, projectile.target, projectile.damage, projectile.slow, now);
    let mut hit = vec![projectile.target];

    if let Some(radius) = projectile.splash_radius {
        let splashed: Vec<TargetRef> = tower_targets(m, side, now)
            .into_iter()
            .filter(|(t, pos)| *t != projectile.target && pos.distance(at) <= radius)
            .map(|(t, _)| t)
            .collect();
        for target in splashed {
            strike(m, side, target, projectile.damage * SPLASH_FACTOR, None, now);
            hit.push(target);
        }
    }

    let mut from = at;
    let mut damage = projectile.damage;
    for _ in 0..projectile.chain_count {
        damage *= CHAIN_FACTOR;
        let candidates: Vec<_> = tower_targets(m, side, now)
            .into_iter()
            .filter(|(t, _)| !hit.contains(t))
            .collect();
        let Some((next, pos)) = CombatSystem::nearest(from, CHAIN_RANGE, &candidates) else {
            break;
        };
        strike(m, side, next, damage, None, now);
        hit.push(next);
        from = pos;
    }
}

/// Projectiles home on their target and are dropped once it is gone
fn advance_projectiles(m: &mut Match, dt: f32, now: f64) {
    let projectiles = std::mem::take(&mut m.projectiles);
    let mut in_flight = Vec::with_capacity(projectiles.len());

    for mut projectile in projectiles {
        let Some(side) = m.side_of(projectile.owner) else {
            continue;
        };
        let Some(target_pos) = target_position(m, side, projectile.target) else {
            continue;
        };

        projectile.velocity = (target_pos - projectile.position).normalized() * PROJECTILE_SPEED;
        projectile.position = projectile.position.move_towards(target_pos, PROJECTILE_SPEED * dt);
        if !in_bounds(projectile.position) {
            continue;
        }
        if projectile.position.distance(target_pos) <= PROJECTILE_HIT_RADIUS {
            impact(m, side, &projectile, projectile.position, now);
            continue;
        }
        in_flight.push(projectile);
    }

    in_flight.append(&mut m.projectiles);
    m.projectiles = in_flight;
}

/// Units march on, crash into the enemy base on arrival, otherwise fight what is in range
fn advance_units(m: &mut Match, dt: f32, now: f64) {
    let mut base_hits = Vec::new();
    let mut events = Vec::new();

    for side in [Side::A, Side::B] {
        let target_base = side.opponent().base_position();
        let (own, opp) = m.players_mut(side);
        let mut units_killed = 0;
        let mut towers_destroyed = 0;

        for i in 0..own.units.len() {
            if !own.units[i].alive {
                continue;
            }
            let element = own.units[i].element;
            let speed_factor = own.effect_factor(now, Stat::TroopSpeed, element);
            let damage_factor = own.effect_factor(now, Stat::TroopDamage, element);
            let unit = &mut own.units[i];
            let damage = unit.damage * damage_factor;

            let step = unit.speed * unit.slow_factor(now) * speed_factor * dt;
            unit.position = unit.position.move_towards(unit.target, step);
            if unit.position.distance(target_base) <= BASE_REACH {
                unit.alive = false;
                base_hits.push((side.opponent(), damage));
                continue;
            }

            let Some(engagement) = CombatSystem::engagement(unit.position, unit.range, opp) else {
                continue;
            };
            if !CombatSystem::can_fire(unit.last_attack_ms, unit.attack_speed, now) {
                continue;
            }
            unit.last_attack_ms = Some(now);
            match engagement {
                Engagement::Unit(j) => {
                    let victim = &mut opp.units[j];
                    let (hp, dead) =
                        CombatSystem::apply_damage(victim.hp, CombatSystem::hit_damage(damage, victim.armor));
                    victim.hp = hp;
                    if dead {
                        victim.alive = false;
                        let (kind, unit_id, owner) = (victim.kind, victim.id, victim.owner);
                        opp.record_fallen(kind);
                        units_killed += 1;
                        events.push(GameEvent::UnitKilled {
                            unit_id,
                            owner,
                            killer: unit.owner,
                        });
                    }
                }
                Engagement::Tower(j) => {
                    let tower = &mut opp.towers[j];
                    let amount = CombatSystem::hit_damage(damage, 0.0) * (1.0 + unit.piercing);
                    let (hp, dead) = CombatSystem::apply_damage(tower.hp, amount);
                    tower.hp = hp;
                    if dead {
                        tower.alive = false;
                        towers_destroyed += 1;
                        events.push(GameEvent::TowerDestroyed {
                            tower_id: tower.id,
                            owner: tower.owner,
                        });
                    }
                }
            }
        }

        own.units_killed += units_killed;
        own.towers_destroyed += towers_destroyed;
    }

    for event in events {
        m.push_event(event);
    }
    for (side, damage) in base_hits {
        m.damage_base(side, damage);
    }
}

fn advance_enemies(m: &mut Match, dt: f32, now: f64) {
    let mut base_hits = Vec::new();
    for enemy in m.enemies.iter_mut().filter(|e| e.alive) {
        let step = enemy.speed * enemy.slow_factor(now) * dt;
        enemy.position = enemy.position.move_towards(enemy.target, step);
        if enemy.position.distance(enemy.target) <= BASE_REACH {
            enemy.alive = false;
            base_hits.push((enemy.lane, enemy.damage));
        }
    }
    for (side, damage) in base_hits {
        m.damage_base(side, damage);
    }
}

/// One combat step: towers fire, projectiles fly, units and wave enemies act
pub(super) fn resolve(m: &mut Match, dt: f32) {
    let now = m.now_ms();
    fire_towers(m, dt, now);
    advance_projectiles(m, dt, now);
    advance_units(m, dt, now);
    advance_enemies(m, dt, now);
}

/// End-of-tick cleanup: expire slows, regenerate towers, drop the dead
pub(super) fn sweep(m: &mut Match, dt: f32) {
    let now = m.now_ms();
    for player in &mut m.players {
        for unit in &mut player.units {
            if unit.slow.is_some_and(|s| !s.is_active(now)) {
                unit.slow = None;
            }
        }
        for tower in player.towers.iter_mut().filter(|t| t.alive) {
            tower.hp = (tower.hp + tower.regen_per_sec * dt).min(tower.max_hp);
        }
        player.units.retain(|u| u.alive);
        player.towers.retain(|t| t.alive);
    }

    for enemy in &mut m.enemies {
        if enemy.slow.is_some_and(|s| !s.is_active(now)) {
            enemy.slow = None;
        }
    }
    m.enemies.retain(|e| e.alive);
}
