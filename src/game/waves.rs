//! Wave director: one shared timer, both lanes spawn together

use rand::Rng;

use crate::ws::protocol::GameEvent;

use super::catalog::ARENA_HEIGHT;
use super::state::{Enemy, Match, Side, Vec2};

/// Wave enemy speed (world units per second)
pub const ENEMY_SPEED: f32 = 35.0;
/// Damage an enemy deals to the base it reaches
pub const ENEMY_BASE_DAMAGE: f32 = 25.0;
/// Vertical margin kept free when spreading a wave
const SPAWN_MARGIN: f32 = 100.0;

/// `5 + 2N`
pub fn enemies_per_lane(wave: u32) -> u32 {
    5 + 2 * wave
}

/// `100 + 20N`
pub fn enemy_hp(wave: u32) -> f32 {
    100.0 + 20.0 * wave as f32
}

/// Start the next wave once the shared deadline has passed
pub(super) fn run(m: &mut Match) {
    let now = m.now_ms();
    if now < m.next_wave_ms {
        return;
    }

    m.wave += 1;
    let wave = m.wave;
    let count = enemies_per_lane(wave);
    for lane in [Side::A, Side::B] {
        spawn_lane(m, lane, wave, count);
    }
    m.next_wave_ms = now + m.settings.wave_interval_ms;

    tracing::debug!(match_id = %m.id, wave, count, "Wave started");
    m.push_event(GameEvent::WaveStarted {
        wave,
        enemies_per_lane: count,
    });
}

/// Enemies for `lane` start at the far end of the arena and walk to its base
fn spawn_lane(m: &mut Match, lane: Side, wave: u32, count: u32) {
    let target = lane.base_position();
    let start_x = lane.opponent().base_position().x;
    let hp = enemy_hp(wave);

    for _ in 0..count {
        let id = m.next_entity_id();
        let y = m.rng.gen_range(SPAWN_MARGIN..ARENA_HEIGHT - SPAWN_MARGIN);
        m.enemies.push(Enemy {
            id,
            lane,
            hp,
            max_hp: hp,
            speed: ENEMY_SPEED,
            damage: ENEMY_BASE_DAMAGE,
            position: Vec2::new(start_x, y),
            target,
            alive: true,
            slow: None,
        });
    }
}

/// Bring the next wave closer by up to `bonus_ms`, never before now.
/// Returns how far it actually moved.
pub(super) fn pull_next_wave(m: &mut Match, bonus_ms: f64) -> f64 {
    let now = m.now_ms();
    let pulled_to = (m.next_wave_ms - bonus_ms).max(now);
    let moved = (m.next_wave_ms - pulled_to).max(0.0);
    m.next_wave_ms -= moved;
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::test_match;

    #[test]
    fn wave_scaling_for_first_ten_waves() {
        let mut m = test_match();
        for n in 1..=10u32 {
            m.enemies.clear();
            m.next_wave_ms = m.now_ms();
            run(&mut m);

            assert_eq!(m.wave, n);
            for lane in [Side::A, Side::B] {
                let lane_enemies: Vec<_> = m.enemies.iter().filter(|e| e.lane == lane).collect();
                assert_eq!(lane_enemies.len() as u32, 5 + 2 * n);
                assert!(lane_enemies.iter().all(|e| e.hp == 100.0 + 20.0 * n as f32));
            }
        }
    }

    #[test]
    fn waves_wait_for_deadline() {
        let mut m = test_match();
        m.next_wave_ms = 500.0;
        m.settings.wave_interval_ms = 10_000.0;

        m.update_game_state(0.25);
        assert_eq!(m.wave, 0);
        m.update_game_state(0.25);
        assert_eq!(m.wave, 1);
        assert_eq!(m.next_wave_ms, 10_500.0);
        m.update_game_state(0.25);
        assert_eq!(m.wave, 1);
    }

    #[test]
    fn enemies_spawn_at_far_end_and_walk_to_their_base() {
        let mut m = test_match();
        m.next_wave_ms = 0.0;
        run(&mut m);
        for enemy in &m.enemies {
            assert_eq!(enemy.target, enemy.lane.base_position());
            assert_eq!(enemy.position.x, enemy.lane.opponent().base_position().x);
        }
    }

    #[test]
    fn pull_never_moves_deadline_into_the_past() {
        let mut m = test_match();
        m.update_game_state(1.0);
        m.next_wave_ms = 3_000.0;
        assert_eq!(pull_next_wave(&mut m, 6_000.0), 2_000.0);
        assert_eq!(m.next_wave_ms, 1_000.0);
        assert_eq!(pull_next_wave(&mut m, 6_000.0), 0.0);
    }
}
