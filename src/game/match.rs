//! Match actor and registry
//!
//! Every match runs in its own task. The task owns the [`Match`] and is the only
//! writer: ticks and queued mutations are processed one at a time, so an action can
//! never interleave with a tick or another action on the same match.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::netcode::CompensationService;
use crate::util::time::{tick_delta, tick_duration, unix_millis};
use crate::ws::protocol::{MatchSummary, PlayerSummary, ServerMsg};

use super::economy::Loadout;
use super::snapshot::SnapshotBuilder;
use super::state::{Match, MatchSettings};

/// A queued closure run against the match by its actor
type Mutation = Box<dyn FnOnce(&mut Match) + Send>;

const COMMAND_QUEUE: usize = 256;
const BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Match already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Player already in a match: {0}")]
    PlayerBusy(Uuid),

    #[error("A match needs two distinct players")]
    SamePlayer,
}

/// Handle to a running match
#[derive(Debug, Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub players: [Uuid; 2],
    mutation_tx: mpsc::Sender<Mutation>,
    state_tx: broadcast::Sender<ServerMsg>,
}

impl MatchHandle {
    /// Receive every broadcast of this match (state frames, match end)
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.state_tx.subscribe()
    }

    pub fn has_player(&self, player_id: Uuid) -> bool {
        self.players.contains(&player_id)
    }

    pub fn opponent_of(&self, player_id: Uuid) -> Option<Uuid> {
        match self.players {
            [a, b] if a == player_id => Some(b),
            [a, b] if b == player_id => Some(a),
            _ => None,
        }
    }
}

/// Registry of all active matches, indexed by match and by player
pub struct MatchRegistry {
    matches: Arc<DashMap<Uuid, MatchHandle>>,
    players: Arc<DashMap<Uuid, Uuid>>,
    compensation: Arc<CompensationService>,
    settings: MatchSettings,
    finished_tx: Option<mpsc::UnboundedSender<MatchSummary>>,
}

impl MatchRegistry {
    pub fn new(settings: MatchSettings, compensation: Arc<CompensationService>) -> Self {
        Self {
            matches: Arc::new(DashMap::new()),
            players: Arc::new(DashMap::new()),
            compensation,
            settings,
            finished_tx: None,
        }
    }

    /// Forward summaries of finished matches to `tx` (the result recorder)
    pub fn with_results_channel(mut self, tx: mpsc::UnboundedSender<MatchSummary>) -> Self {
        self.finished_tx = Some(tx);
        self
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn match_for_player(&self, player_id: &Uuid) -> Option<MatchHandle> {
        let match_id = *self.players.get(player_id)?.value();
        self.get(&match_id)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.players.len()
    }

    /// Create a match from two resolved loadouts and start its actor
    pub fn initialize_match(
        &self,
        id: Uuid,
        loadout_a: &Loadout,
        loadout_b: &Loadout,
    ) -> Result<MatchHandle, RegistryError> {
        let players = [loadout_a.player_id, loadout_b.player_id];
        if players[0] == players[1] {
            return Err(RegistryError::SamePlayer);
        }

        let seed = rand::thread_rng().gen();
        let state = Match::new(id, loadout_a, loadout_b, self.settings.clone(), seed);
        let (game_match, handle) = GameMatch::new(
            state,
            self.matches.clone(),
            self.players.clone(),
            self.compensation.clone(),
            self.finished_tx.clone(),
        );

        match self.matches.entry(id) {
            Entry::Occupied(_) => return Err(RegistryError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
            }
        }

        // Claim both players; a concurrent claim on either one undoes this match
        for (i, player) in players.iter().enumerate() {
            let claimed = match self.players.entry(*player) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(id);
                    true
                }
            };
            if !claimed {
                for earlier in &players[..i] {
                    self.players.remove_if(earlier, |_, match_id| *match_id == id);
                }
                self.matches.remove(&id);
                return Err(RegistryError::PlayerBusy(*player));
            }
        }

        tokio::spawn(game_match.run());

        info!(
            match_id = %id,
            player_a = %players[0],
            player_b = %players[1],
            hero_a = ?loadout_a.hero,
            hero_b = ?loadout_b.hero,
            "Match initialized"
        );
        Ok(handle)
    }

    /// Run `f` on the match inside its actor. `None` if the match is unknown or gone.
    pub async fn apply_mutation<R, F>(&self, id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut Match) -> R + Send + 'static,
        R: Send + 'static,
    {
        let handle = self.get(&id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let mutation: Mutation = Box::new(move |m| {
            let _ = reply_tx.send(f(m));
        });
        handle.mutation_tx.send(mutation).await.ok()?;
        reply_rx.await.ok()
    }

    /// Point-in-time copy of a match
    pub async fn get_match(&self, id: Uuid) -> Option<Match> {
        self.apply_mutation(id, |m| m.clone()).await
    }
}

/// The authoritative match actor
pub struct GameMatch {
    state: Match,
    mutation_rx: mpsc::Receiver<Mutation>,
    state_tx: broadcast::Sender<ServerMsg>,
    matches: Arc<DashMap<Uuid, MatchHandle>>,
    players: Arc<DashMap<Uuid, Uuid>>,
    compensation: Arc<CompensationService>,
    finished_tx: Option<mpsc::UnboundedSender<MatchSummary>>,
    snapshot_seq: u64,
}

impl GameMatch {
    fn new(
        state: Match,
        matches: Arc<DashMap<Uuid, MatchHandle>>,
        players: Arc<DashMap<Uuid, Uuid>>,
        compensation: Arc<CompensationService>,
        finished_tx: Option<mpsc::UnboundedSender<MatchSummary>>,
    ) -> (Self, MatchHandle) {
        let (mutation_tx, mutation_rx) = mpsc::channel(COMMAND_QUEUE);
        let (state_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let handle = MatchHandle {
            id: state.id,
            players: [state.players[0].player_id, state.players[1].player_id],
            mutation_tx,
            state_tx: state_tx.clone(),
        };

        let game_match = Self {
            state,
            mutation_rx,
            state_tx,
            matches,
            players,
            compensation,
            finished_tx,
            snapshot_seq: 0,
        };

        (game_match, handle)
    }

    /// Run the authoritative tick loop until the match finishes
    pub async fn run(mut self) {
        let id = self.state.id;
        let tick_rate = self.state.settings.tick_rate;
        let dt = tick_delta(tick_rate);
        info!(match_id = %id, tick_rate, "Match started");

        let mut tick_interval = interval(tick_duration(tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.run_tick(dt);
                    if !self.state.is_running() {
                        break;
                    }
                }
                Some(mutation) = self.mutation_rx.recv() => {
                    mutation(&mut self.state);
                }
            }
        }

        self.finish();
    }

    fn run_tick(&mut self, dt: f32) {
        let view = self.state.update_game_state(dt);
        // No subscribers is fine
        let _ = self.state_tx.send(ServerMsg::State(view));

        self.snapshot_seq += 1;
        let snapshot = SnapshotBuilder::capture(&self.state, unix_millis() as f64, self.snapshot_seq);
        self.compensation.push_snapshot(self.state.id, snapshot);
    }

    fn finish(mut self) {
        let id = self.state.id;
        let summary = build_summary(&self.state);
        info!(
            match_id = %id,
            winner = ?summary.winner,
            ticks = self.state.tick,
            waves = summary.waves,
            "Match ended"
        );

        // Late mutations see the match as gone
        self.mutation_rx.close();
        self.matches.remove(&id);
        for player in &self.state.players {
            self.players.remove_if(&player.player_id, |_, match_id| *match_id == id);
        }
        self.compensation.clear_match(id);

        let _ = self.state_tx.send(ServerMsg::MatchEnd(summary.clone()));
        if let Some(tx) = &self.finished_tx {
            if tx.send(summary).is_err() {
                warn!(match_id = %id, "Result recorder is gone, summary dropped");
            }
        } else {
            debug!(match_id = %id, "No result recorder configured");
        }
    }
}

fn build_summary(m: &Match) -> MatchSummary {
    MatchSummary {
        match_id: m.id,
        winner: m.winner,
        waves: m.wave,
        duration_ms: m.elapsed_ms,
        players: m
            .players
            .iter()
            .map(|p| PlayerSummary {
                player_id: p.player_id,
                hero: p.hero,
                base_hp: p.base_hp,
                units_killed: p.units_killed,
                towers_destroyed: p.towers_destroyed,
                enemies_killed: p.enemies_killed,
                submissions_passed: p.submissions_passed,
            })
            .collect(),
        ended_at: chrono::Utc::now(),
    }
}
