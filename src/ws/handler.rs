//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchHandle, Vec2};
use crate::http::middleware::verify_jwt;
use crate::netcode::{InputPayload, InputSample};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Direct replies queued per connection (action results, pongs, corrections)
const REPLY_QUEUE: usize = 64;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    match verify_jwt(&query.token, &state.config.supabase_jwt_secret) {
        Ok(claims) => {
            info!(user_id = %claims.sub, "WebSocket upgrade for authenticated user");
            ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, state))
        }
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

/// Connection-scoped identifiers passed to every message handler
struct Session {
    user_id: Uuid,
    match_id: Uuid,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, state: AppState) {
    info!(user_id = %user_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Send welcome message
    let welcome = ServerMsg::Welcome {
        user_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    // Matches are created by the matchmaker before players connect
    let Some(handle) = state.matches.match_for_player(&user_id) else {
        warn!(user_id = %user_id, "No active match for player");
        let _ = send_msg(
            &mut ws_sink,
            &ServerMsg::Error {
                message: "No active match".to_string(),
            },
        )
        .await;
        return;
    };

    // Subscribe before the join message so no state frame is missed
    let state_rx = handle.subscribe();

    let Some(joined) = joined_message(&state, &handle, user_id).await else {
        let _ = send_msg(
            &mut ws_sink,
            &ServerMsg::Error {
                message: "Match already finished".to_string(),
            },
        )
        .await;
        return;
    };

    if let Err(e) = send_msg(&mut ws_sink, &joined).await {
        error!(user_id = %user_id, error = %e, "Failed to send match info");
        return;
    }

    let session = Session {
        user_id,
        match_id: handle.id,
    };

    run_session(&state, &session, ws_sink, ws_stream, state_rx).await;

    // Cleanup on disconnect: the match cannot continue without this player
    let forfeited = state
        .matches
        .apply_mutation(session.match_id, move |m| m.forfeit(user_id))
        .await
        .unwrap_or(false);
    if forfeited {
        info!(user_id = %user_id, match_id = %session.match_id, "Player disconnected, match forfeited");
    }
    state.compensation.clear_player(&user_id);

    info!(user_id = %user_id, "WebSocket connection closed");
}

async fn joined_message(state: &AppState, handle: &MatchHandle, user_id: Uuid) -> Option<ServerMsg> {
    let (side, hero) = state
        .matches
        .apply_mutation(handle.id, move |m| {
            let side = m.side_of(user_id)?;
            Some((side, m.player(side).hero))
        })
        .await
        .flatten()?;

    Some(ServerMsg::MatchJoined {
        match_id: handle.id,
        side,
        opponent_id: handle.opponent_of(user_id)?,
        hero,
    })
}

/// Run the WebSocket session with read/write split
async fn run_session(
    state: &AppState,
    session: &Session,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut state_rx: broadcast::Receiver<ServerMsg>,
) {
    let user_id = session.user_id;
    let rate_limiter = PlayerRateLimiter::new();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(REPLY_QUEUE);

    // Spawn writer task: match broadcast + direct replies -> WebSocket
    let compensation = state.compensation.clone();
    let tick_rate = state.config.match_settings.tick_rate;
    let writer_handle = tokio::spawn(async move {
        let mut throttle = SendThrottle::default();
        loop {
            let msg = tokio::select! {
                received = state_rx.recv() => match received {
                    Ok(ServerMsg::State(view)) => {
                        if !throttle.admit(compensation.send_rate(&user_id), tick_rate) {
                            continue;
                        }
                        ServerMsg::State(view)
                    }
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            user_id = %user_id,
                            lagged_count = n,
                            "Client lagged, skipping {} state frames", n
                        );
                        // Continue - don't disconnect for lag
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(user_id = %user_id, "State channel closed");
                        break;
                    }
                },
                Some(reply) = reply_rx.recv() => reply,
            };

            let finished = matches!(msg, ServerMsg::MatchEnd(_));
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(user_id = %user_id, error = %e, "WebSocket send failed");
                break;
            }
            if finished {
                let _ = ws_sink.close().await;
                break;
            }
        }
    });

    // Reader loop: WebSocket -> match actor
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if !admit(&rate_limiter, &client_msg) {
                    warn!(user_id = %user_id, action = client_msg.action_name(), "Rate limited client message");
                    continue;
                }

                if matches!(client_msg, ClientMsg::Leave) {
                    info!(user_id = %user_id, "Player left the match");
                    break;
                }

                if let Some(reply) = handle_client_msg(state, session, client_msg).await {
                    if reply_tx.send(reply).await.is_err() {
                        debug!(user_id = %user_id, "Writer task gone");
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(user_id = %user_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(user_id = %user_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

fn admit(limiter: &PlayerRateLimiter, msg: &ClientMsg) -> bool {
    match msg {
        ClientMsg::Input { .. } | ClientMsg::Ping { .. } => limiter.check_input(),
        ClientMsg::Leave => true,
        _ => limiter.check_action(),
    }
}

/// Dispatch one client message. Returns the direct reply, if any.
async fn handle_client_msg(state: &AppState, session: &Session, msg: ClientMsg) -> Option<ServerMsg> {
    let user_id = session.user_id;
    let match_id = session.match_id;
    let action = msg.action_name();

    let result = match msg {
        ClientMsg::PlaceTower { kind, x, y } => {
            state
                .matches
                .apply_mutation(match_id, move |m| m.place_tower(user_id, &kind, x, y))
                .await
        }
        ClientMsg::DeployUnit { kind } => {
            state
                .matches
                .apply_mutation(match_id, move |m| m.deploy_unit(user_id, &kind))
                .await
        }
        ClientMsg::UseAbility => {
            // The client aimed at what it saw one latency ago
            if let Some(seen) = state
                .compensation
                .rewind_to_player_time(&match_id, &user_id, unix_millis() as f64)
            {
                debug!(
                    user_id = %user_id,
                    match_id = %match_id,
                    snapshot_seq = seen.sequence,
                    snapshot_tick = seen.tick,
                    "Ability evaluated against rewound snapshot"
                );
            }
            state
                .matches
                .apply_mutation(match_id, move |m| m.use_hero_ability(user_id))
                .await
        }
        ClientMsg::Input {
            seq,
            payload,
            client_ts,
            predicted,
        } => return handle_input(state, session, seq, payload, client_ts, predicted).await,
        ClientMsg::Ping { t, rtt_ms } => {
            if let Some(rtt) = rtt_ms {
                match state.compensation.update_player_latency(user_id, rtt) {
                    Some(report) => debug!(
                        user_id = %user_id,
                        latency_ms = report.latency_ms,
                        jitter_ms = report.jitter_ms,
                        send_rate = report.send_rate,
                        "Latency updated"
                    ),
                    None => warn!(user_id = %user_id, rtt_ms = rtt, "Rejected RTT sample"),
                }
            }
            return Some(ServerMsg::Pong {
                t,
                server_time: unix_millis(),
                send_rate: state.compensation.send_rate(&user_id),
            });
        }
        ClientMsg::Leave => return None,
    };

    // Outer None: match gone. Inner None: player not in the match.
    match result.flatten() {
        Some(result) => {
            if let Err(e) = &result {
                debug!(user_id = %user_id, action, error = %e, "Action rejected");
            }
            Some(ServerMsg::ActionResult {
                action,
                reply: result.into(),
            })
        }
        None => Some(ServerMsg::Error {
            message: "Match is no longer active".to_string(),
        }),
    }
}

/// Store the input, apply it in the match and reconcile the client's prediction
/// against the commander position from before this input
async fn handle_input(
    state: &AppState,
    session: &Session,
    seq: u32,
    payload: InputPayload,
    client_ts: f64,
    predicted: Option<Vec2>,
) -> Option<ServerMsg> {
    let user_id = session.user_id;
    let sample = InputSample {
        seq,
        payload,
        client_ts,
    };
    if !state.compensation.store_player_input(user_id, sample) {
        debug!(user_id = %user_id, seq, "Stale input dropped");
        return None;
    }

    let ((baseline, acked_seq), applied) = state
        .matches
        .apply_mutation(session.match_id, move |m| {
            let baseline = m.commander_state(user_id)?;
            let applied = m.apply_commander_input(user_id, seq, &payload)?;
            Some((baseline, applied))
        })
        .await
        .flatten()?;

    if !applied {
        // Already reflected in the match; nothing to reconcile
        state.compensation.acknowledge_inputs(&user_id, seq);
        return None;
    }

    let correction = predicted.and_then(|predicted| {
        let result = state
            .compensation
            .reconcile_player_state(&user_id, predicted, baseline, acked_seq);
        result.needs_correction.then_some(result)
    });
    state.compensation.acknowledge_inputs(&user_id, seq);

    correction.map(|result| {
        debug!(
            user_id = %user_id,
            seq,
            divergence = result.divergence,
            replayed = result.replayed,
            "Correcting client prediction"
        );
        ServerMsg::Reconciliation {
            seq,
            x: result.position.x,
            y: result.position.y,
            divergence: result.divergence,
        }
    })
}

/// Spreads state frames so a client gets `send_rate` of every `tick_rate` ticks
#[derive(Debug, Default)]
struct SendThrottle {
    credit: f32,
}

impl SendThrottle {
    fn admit(&mut self, send_rate: u32, tick_rate: u32) -> bool {
        if tick_rate == 0 || send_rate >= tick_rate {
            return true;
        }
        self.credit = (self.credit + send_rate as f32 / tick_rate as f32).min(2.0);
        if self.credit >= 1.0 {
            self.credit -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
