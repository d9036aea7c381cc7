//! PostgREST access to the arena tables, authenticated with the service_role key

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::Config;
use crate::game::economy::TechUpgrade;

use super::loadouts::LoadoutRow;
use super::results::{MatchResultRow, PlayerStats};

/// Upper bound for a single PostgREST call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const PLAYER_LOADOUTS: &str = "player_loadouts";
const PLAYER_TECH_UPGRADES: &str = "player_tech_upgrades";
const MATCH_RESULTS: &str = "match_results";
const PLAYER_STATS: &str = "player_stats";

/// Service-side Supabase client. The service_role key bypasses RLS, so it never
/// leaves the server.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    rest_base: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base(&config.supabase_url, &config.supabase_service_role_key)
    }

    fn with_base(project_url: &str, service_role_key: &str) -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            rest_base: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            service_role_key: service_role_key.to_string(),
        }
    }

    // ------------------------------------------------------------------------
    // Progression (read)
    // ------------------------------------------------------------------------

    /// The player's stored hero and unlocks, if any
    pub async fn fetch_loadout_row(&self, user_id: Uuid) -> Result<Option<LoadoutRow>, SupabaseError> {
        first_row(self.by_user(PLAYER_LOADOUTS, user_id)).await
    }

    /// Every tech upgrade the player has bought
    pub async fn fetch_tech_upgrades(&self, user_id: Uuid) -> Result<Vec<TechUpgrade>, SupabaseError> {
        rows(self.by_user(PLAYER_TECH_UPGRADES, user_id).query(&[("select", "stat,mode,value")])).await
    }

    // ------------------------------------------------------------------------
    // Results (write)
    // ------------------------------------------------------------------------

    pub async fn insert_match_result(&self, row: &MatchResultRow) -> Result<(), SupabaseError> {
        let request = self
            .table(Method::POST, MATCH_RESULTS)
            .header("Prefer", "return=minimal")
            .json(row);
        checked(request.send().await?).await?;
        Ok(())
    }

    /// Lifetime totals, `None` before the player's first recorded match
    pub async fn fetch_player_stats(&self, user_id: Uuid) -> Result<Option<PlayerStats>, SupabaseError> {
        first_row(self.by_user(PLAYER_STATS, user_id)).await
    }

    pub async fn upsert_player_stats(&self, stats: &PlayerStats) -> Result<(), SupabaseError> {
        checked(self.upsert_stats_request(stats).send().await?).await?;
        Ok(())
    }

    fn upsert_stats_request(&self, stats: &PlayerStats) -> RequestBuilder {
        self.table(Method::POST, PLAYER_STATS)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(stats)
    }

    /// Authenticated request against one table
    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_base, table))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    fn by_user(&self, table: &str, user_id: Uuid) -> RequestBuilder {
        self.table(Method::GET, table)
            .query(&[("user_id", format!("eq.{}", user_id))])
    }
}

async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, SupabaseError> {
    let response = checked(request.send().await?).await?;
    response.json().await.map_err(SupabaseError::Parse)
}

async fn first_row<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>, SupabaseError> {
    let found: Vec<T> = rows(request.query(&[("limit", "1")])).await?;
    Ok(found.into_iter().next())
}

/// Turn a non-2xx PostgREST reply into `SupabaseError::Api`
async fn checked(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::with_base("https://arena.supabase.co/", "service-key")
    }

    #[test]
    fn user_queries_filter_by_user_id() {
        let user = Uuid::new_v4();
        let request = client().by_user(PLAYER_LOADOUTS, user).build().unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().path(), "/rest/v1/player_loadouts");
        assert_eq!(request.url().query(), Some(format!("user_id=eq.{}", user).as_str()));
        assert_eq!(request.headers()["apikey"], "service-key");
        assert_eq!(request.headers()["authorization"], "Bearer service-key");
    }

    #[test]
    fn stats_upsert_merges_on_user_id() {
        let stats = PlayerStats::new(Uuid::new_v4());
        let request = client().upsert_stats_request(&stats).build().unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), "/rest/v1/player_stats");
        assert_eq!(request.url().query(), Some("on_conflict=user_id"));
        assert_eq!(
            request.headers()["prefer"],
            "resolution=merge-duplicates,return=minimal"
        );
    }
}
