//! HTTP route definitions

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::abilities::HeroId;
use crate::game::{ActionReply, CodingSubmission, MatchStatus, RegistryError, Side};
use crate::http::middleware::{require_auth, require_service_key, AuthenticatedUser, SERVICE_KEY_HEADER};
use crate::netcode::InterpolatedState;
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;

/// How far behind live a spectator view is rendered (ms)
const SPECTATOR_DELAY_MS: f64 = 100.0;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SERVICE_KEY_HEADER),
        ])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Player routes (Supabase JWT)
    let player_routes = Router::new()
        .route("/matches/current", get(current_match_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Matchmaker routes (service key)
    let service_routes = Router::new()
        .route("/matches", post(create_match_handler))
        .route("/matches/:id", get(match_status_handler))
        .route("/matches/:id/view", get(match_view_handler))
        .route("/matches/:id/submissions", post(submission_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_service_key));

    Router::new()
        .merge(public_routes)
        .merge(player_routes)
        .merge(service_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
    tracked_connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.matches.active_matches(),
        active_players: state.matches.total_players(),
        tracked_connections: state.compensation.tracked_players(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateMatchRequest {
    /// Generated when the matchmaker does not supply one
    #[serde(default)]
    match_id: Option<Uuid>,
    player_a_id: Uuid,
    player_b_id: Uuid,
}

#[derive(Serialize)]
struct CreateMatchResponse {
    match_id: Uuid,
    players: [Uuid; 2],
    heroes: [HeroId; 2],
    ws_path: &'static str,
}

/// Resolve both loadouts and start the match actor
async fn create_match_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    if req.player_a_id == req.player_b_id {
        return Err(AppError::BadRequest(RegistryError::SamePlayer.to_string()));
    }

    let match_id = req.match_id.unwrap_or_else(Uuid::new_v4);
    let (loadout_a, loadout_b) = tokio::join!(
        state.loadout_store.resolve_loadout(req.player_a_id),
        state.loadout_store.resolve_loadout(req.player_b_id),
    );

    let handle = state
        .matches
        .initialize_match(match_id, &loadout_a, &loadout_b)
        .map_err(|e| match e {
            RegistryError::SamePlayer => AppError::BadRequest(e.to_string()),
            RegistryError::AlreadyExists(_) | RegistryError::PlayerBusy(_) => AppError::Conflict(e.to_string()),
        })?;

    info!(match_id = %handle.id, "Match created by matchmaker");

    Ok((
        StatusCode::CREATED,
        Json(CreateMatchResponse {
            match_id: handle.id,
            players: handle.players,
            heroes: [loadout_a.hero, loadout_b.hero],
            ws_path: "/ws",
        }),
    ))
}

#[derive(Deserialize)]
struct SubmissionRequest {
    player_id: Uuid,
    #[serde(flatten)]
    submission: CodingSubmission,
}

/// Judge verdict for a player's submission, forwarded by the code-judge service
async fn submission_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<SubmissionRequest>,
) -> Result<Json<ActionReply>, AppError> {
    let SubmissionRequest { player_id, submission } = req;
    let problem_id = submission.problem_id.clone();

    let result = state
        .matches
        .apply_mutation(match_id, move |m| m.process_coding_submission(player_id, &submission))
        .await
        .ok_or_else(|| AppError::NotFound(format!("match {}", match_id)))?
        .ok_or_else(|| AppError::NotFound(format!("player {} in match {}", player_id, match_id)))?;

    match &result {
        Ok(_) => info!(match_id = %match_id, player_id = %player_id, problem_id = %problem_id, "Submission applied"),
        Err(e) => debug!(match_id = %match_id, player_id = %player_id, error = %e, "Submission rejected"),
    }

    Ok(Json(result.into()))
}

#[derive(Serialize)]
struct PlayerStatus {
    player_id: Uuid,
    side: Side,
    hero: HeroId,
    base_hp: f32,
    gold: f32,
    energy: f32,
    units: usize,
    towers: usize,
}

#[derive(Serialize)]
struct MatchStatusResponse {
    match_id: Uuid,
    status: MatchStatus,
    winner: Option<Uuid>,
    tick: u64,
    wave: u32,
    elapsed_ms: f64,
    players: Vec<PlayerStatus>,
}

async fn match_status_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<MatchStatusResponse>, AppError> {
    let m = state
        .matches
        .get_match(match_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("match {}", match_id)))?;

    Ok(Json(MatchStatusResponse {
        match_id: m.id,
        status: m.status,
        winner: m.winner,
        tick: m.tick,
        wave: m.wave,
        elapsed_ms: m.elapsed_ms,
        players: m
            .players
            .iter()
            .map(|p| PlayerStatus {
                player_id: p.player_id,
                side: p.side,
                hero: p.hero,
                base_hp: p.base_hp,
                gold: p.gold,
                energy: p.energy,
                units: p.units.len(),
                towers: p.towers.len(),
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct ViewQuery {
    /// Server wall clock to render at (ms); defaults to slightly behind live
    render_time: Option<f64>,
}

/// Interpolated spectator view from the match's snapshot history
async fn match_view_handler(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<InterpolatedState>, AppError> {
    let render_time = query
        .render_time
        .unwrap_or_else(|| unix_millis() as f64 - SPECTATOR_DELAY_MS);

    state
        .compensation
        .interpolate_state(&match_id, render_time)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("snapshots for match {}", match_id)))
}

#[derive(Serialize)]
struct CurrentMatchResponse {
    match_id: Uuid,
    opponent_id: Option<Uuid>,
    ws_path: &'static str,
}

/// Lets a client find its match before opening the socket
async fn current_match_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<CurrentMatchResponse>, AppError> {
    let handle = state
        .matches
        .match_for_player(&auth.user_id)
        .ok_or_else(|| AppError::NotFound("no active match".to_string()))?;

    Ok(Json(CurrentMatchResponse {
        match_id: handle.id,
        opponent_id: handle.opponent_of(auth.user_id),
        ws_path: "/ws",
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::mpsc;

    use super::*;
    use crate::config::Config;
    use crate::game::economy::Loadout;
    use crate::game::ActionOk;

    fn test_state() -> AppState {
        let env = HashMap::from([
            ("SUPABASE_URL", "http://localhost:54321"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("SUPABASE_JWT_SECRET", "secret"),
            ("MATCH_SERVICE_KEY", "matchmaker"),
            ("CLIENT_ORIGIN", "http://localhost:5173"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        let (results_tx, _results_rx) = mpsc::unbounded_channel();
        AppState::new(config, results_tx)
    }

    fn verdict(player_id: Uuid) -> SubmissionRequest {
        serde_json::from_value(serde_json::json!({
            "player_id": player_id,
            "problem_id": "two-sum",
            "status": "PASS",
            "difficulty": "easy",
            "execution_time_ms": 120
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn judge_verdicts_reach_the_match() {
        let state = test_state();
        let a = Loadout::starter(Uuid::new_v4(), HeroId::Warlord);
        let b = Loadout::starter(Uuid::new_v4(), HeroId::Phantom);
        let handle = state.matches.initialize_match(Uuid::new_v4(), &a, &b).unwrap();

        let Json(reply) = submission_handler(State(state.clone()), Path(handle.id), Json(verdict(a.player_id)))
            .await
            .unwrap();
        assert!(reply.success);
        assert!(matches!(reply.result, Some(ActionOk::SubmissionProcessed(ref outcome)) if outcome.passed));

        let stranger = submission_handler(State(state.clone()), Path(handle.id), Json(verdict(Uuid::new_v4()))).await;
        assert!(matches!(stranger, Err(AppError::NotFound(_))));

        let unknown = submission_handler(State(state), Path(Uuid::new_v4()), Json(verdict(a.player_id))).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));
    }

    #[test]
    fn create_request_accepts_missing_match_id() {
        let req: CreateMatchRequest = serde_json::from_str(
            r#"{"player_a_id":"6f1c1f7e-98a5-4d63-9a8c-3c1f0b5e2a11","player_b_id":"0b0f5a4e-1111-4c2d-8e3f-123456789abc"}"#,
        )
        .unwrap();
        assert!(req.match_id.is_none());
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(
            AppError::Conflict("busy".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("gone".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BadRequest("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
