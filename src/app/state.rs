//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::netcode::CompensationService;
use crate::store::{LoadoutStore, ResultStore, SupabaseClient};
use crate::ws::protocol::MatchSummary;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub loadout_store: LoadoutStore,
    pub result_store: ResultStore,
    pub compensation: Arc<CompensationService>,
    pub matches: Arc<MatchRegistry>,
}

impl AppState {
    /// Wire stores and services. Summaries of finished matches go to `results_tx`.
    pub fn new(config: Config, results_tx: mpsc::UnboundedSender<MatchSummary>) -> Self {
        let config = Arc::new(config);

        // Initialize Supabase client
        let supabase = SupabaseClient::new(&config);

        // Initialize stores
        let loadout_store = LoadoutStore::new(supabase.clone());
        let result_store = ResultStore::new(supabase);

        // Compensation buffers are shared by match actors and sockets
        let compensation = Arc::new(CompensationService::new());

        // Initialize match registry
        let matches = Arc::new(
            MatchRegistry::new(config.match_settings.clone(), compensation.clone()).with_results_channel(results_tx),
        );

        Self {
            config,
            loadout_store,
            result_store,
            compensation,
            matches,
        }
    }
}
