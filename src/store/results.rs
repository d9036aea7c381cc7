//! Persisting finished matches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::ws::protocol::{MatchSummary, PlayerSummary};

use super::supabase::{SupabaseClient, SupabaseError};

/// Row of the `match_results` table
#[derive(Debug, Clone, Serialize)]
pub struct MatchResultRow {
    pub match_id: Uuid,
    pub winner_id: Option<Uuid>,
    pub player_a_id: Uuid,
    pub player_b_id: Uuid,
    pub waves: u32,
    pub duration_ms: i64,
    pub players: Vec<PlayerSummary>,
    pub ended_at: DateTime<Utc>,
}

impl MatchResultRow {
    pub fn from_summary(summary: &MatchSummary) -> Option<Self> {
        let [a, b] = summary.players.as_slice() else {
            return None;
        };
        Some(Self {
            match_id: summary.match_id,
            winner_id: summary.winner,
            player_a_id: a.player_id,
            player_b_id: b.player_id,
            waves: summary.waves,
            duration_ms: summary.duration_ms.round() as i64,
            players: summary.players.clone(),
            ended_at: summary.ended_at,
        })
    }
}

/// Lifetime totals in the `player_stats` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: Uuid,
    #[serde(default)]
    pub matches_played: u32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub units_killed: u32,
    #[serde(default)]
    pub towers_destroyed: u32,
    #[serde(default)]
    pub enemies_killed: u32,
    #[serde(default)]
    pub submissions_passed: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PlayerStats {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Add one finished match. A match without a winner counts for neither column.
    pub fn record(&mut self, player: &PlayerSummary, winner: Option<Uuid>, at: DateTime<Utc>) {
        self.matches_played += 1;
        match winner {
            Some(w) if w == player.player_id => self.wins += 1,
            Some(_) => self.losses += 1,
            None => {}
        }
        self.units_killed += player.units_killed;
        self.towers_destroyed += player.towers_destroyed;
        self.enemies_killed += player.enemies_killed;
        self.submissions_passed += player.submissions_passed;
        self.updated_at = Some(at);
    }
}

/// Result store operations
#[derive(Clone)]
pub struct ResultStore {
    client: SupabaseClient,
}

impl ResultStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Insert the match row and fold the match into both players' totals
    pub async fn record_match(&self, summary: &MatchSummary) -> Result<(), SupabaseError> {
        if let Some(row) = MatchResultRow::from_summary(summary) {
            self.client.insert_match_result(&row).await?;
        }

        for player in &summary.players {
            let mut stats = self
                .client
                .fetch_player_stats(player.player_id)
                .await?
                .unwrap_or_else(|| PlayerStats::new(player.player_id));
            stats.record(player, summary.winner, summary.ended_at);
            self.client.upsert_player_stats(&stats).await?;
        }

        Ok(())
    }

    /// Drain finished matches until every sender is gone. Runs as its own task so
    /// match actors never wait on the store.
    pub async fn run_recorder(self, mut rx: mpsc::UnboundedReceiver<MatchSummary>) {
        while let Some(summary) = rx.recv().await {
            match self.record_match(&summary).await {
                Ok(()) => info!(match_id = %summary.match_id, winner = ?summary.winner, "Match result recorded"),
                Err(e) => error!(match_id = %summary.match_id, error = %e, "Failed to record match result"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::abilities::HeroId;

    fn player(id: Uuid, units_killed: u32) -> PlayerSummary {
        PlayerSummary {
            player_id: id,
            hero: HeroId::Warlord,
            base_hp: 500.0,
            units_killed,
            towers_destroyed: 1,
            enemies_killed: 4,
            submissions_passed: 2,
        }
    }

    fn summary(winner: Option<Uuid>, players: Vec<PlayerSummary>) -> MatchSummary {
        MatchSummary {
            match_id: Uuid::new_v4(),
            winner,
            waves: 3,
            duration_ms: 90_000.4,
            players,
            ended_at: Utc::now(),
        }
    }

    #[test]
    fn result_row_needs_both_players() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let row = MatchResultRow::from_summary(&summary(Some(a), vec![player(a, 3), player(b, 1)])).unwrap();
        assert_eq!(row.player_a_id, a);
        assert_eq!(row.player_b_id, b);
        assert_eq!(row.duration_ms, 90_000);

        assert!(MatchResultRow::from_summary(&summary(None, vec![player(a, 0)])).is_none());
    }

    #[test]
    fn stats_accumulate_wins_and_losses() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let mut stats = PlayerStats::new(a);

        stats.record(&player(a, 3), Some(a), now);
        stats.record(&player(a, 2), Some(b), now);
        stats.record(&player(a, 0), None, now);

        assert_eq!(stats.matches_played, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.units_killed, 5);
        assert_eq!(stats.submissions_passed, 6);
        assert_eq!(stats.updated_at, Some(now));
    }

    #[test]
    fn stored_stats_parse_with_missing_columns() {
        let stats: PlayerStats =
            serde_json::from_str(r#"{"user_id":"6f1c1f7e-98a5-4d63-9a8c-3c1f0b5e2a11","wins":4}"#).unwrap();
        assert_eq!(stats.wins, 4);
        assert_eq!(stats.matches_played, 0);
    }
}
