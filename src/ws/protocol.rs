//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::abilities::HeroId;
use crate::game::actions::ActionReply;
use crate::game::catalog::{TowerKind, UnitKind};
use crate::game::state::{EffectKind, EntityId, Enemy, MatchStatus, Projectile, Side, Tower, Unit, Vec2};
use crate::netcode::input_history::InputPayload;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Build a tower on our half
    PlaceTower {
        /// Tower type name, e.g. "arrow"
        kind: String,
        x: f32,
        y: f32,
    },

    /// Send a unit down the lane
    DeployUnit {
        /// Unit type name, e.g. "soldier"
        kind: String,
    },

    /// Fire the hero's active ability
    UseAbility,

    /// Commander movement for one fixed step
    Input {
        /// Sequence number for client-side prediction reconciliation
        seq: u32,
        #[serde(flatten)]
        payload: InputPayload,
        /// Client timestamp (ms)
        #[serde(default)]
        client_ts: f64,
        /// Where the client predicts its commander is after this input
        #[serde(default)]
        predicted: Option<Vec2>,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
        /// Round trip the client measured for its previous ping
        #[serde(default)]
        rtt_ms: Option<f64>,
    },

    /// Surrender the current match
    Leave,
}

impl ClientMsg {
    /// Name used in action results and logs
    pub fn action_name(&self) -> &'static str {
        match self {
            ClientMsg::PlaceTower { .. } => "place_tower",
            ClientMsg::DeployUnit { .. } => "deploy_unit",
            ClientMsg::UseAbility => "use_ability",
            ClientMsg::Input { .. } => "input",
            ClientMsg::Ping { .. } => "ping",
            ClientMsg::Leave => "leave",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        server_time: u64,
    },

    /// The player's current match
    MatchJoined {
        match_id: Uuid,
        side: Side,
        opponent_id: Uuid,
        hero: HeroId,
    },

    /// Authoritative game state, throttled to the player's send rate
    State(GameStateView),

    /// Outcome of a player action
    ActionResult {
        action: &'static str,
        #[serde(flatten)]
        reply: ActionReply,
    },

    /// Prediction drifted; snap the commander to this position
    Reconciliation {
        seq: u32,
        x: f32,
        y: f32,
        divergence: f32,
    },

    /// Pong response
    Pong {
        t: u64,
        server_time: u64,
        /// Updates per second the server will now send
        send_rate: u32,
    },

    /// Match has ended
    MatchEnd(MatchSummary),

    /// Error message
    Error {
        message: String,
    },
}

/// Active effect as shown to clients
#[derive(Debug, Clone, Serialize)]
pub struct EffectView {
    pub kind: EffectKind,
    pub remaining_ms: f64,
}

/// One player's side of the board
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub player_id: Uuid,
    pub side: Side,
    pub hero: HeroId,
    pub gold: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub base_hp: f32,
    pub base_max_hp: f32,
    pub ability_cooldown_ms: f64,
    pub units: Vec<Unit>,
    pub towers: Vec<Tower>,
    pub effects: Vec<EffectView>,
    pub units_killed: u32,
    pub towers_destroyed: u32,
    pub enemies_killed: u32,
    pub success_streak: u32,
    pub commander: Vec2,
    pub last_input_seq: u32,
}

/// Serializable per-tick view of a match
#[derive(Debug, Clone, Serialize)]
pub struct GameStateView {
    pub match_id: Uuid,
    pub tick: u64,
    pub time_ms: f64,
    pub wave: u32,
    pub next_wave_in_ms: f64,
    pub status: MatchStatus,
    pub winner: Option<Uuid>,
    pub players: Vec<PlayerView>,
    pub projectiles: Vec<Projectile>,
    pub enemies: Vec<Enemy>,
    pub events: Vec<GameEvent>,
}

/// Game events since the previous tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    TowerPlaced {
        player_id: Uuid,
        tower_id: EntityId,
        kind: TowerKind,
        x: f32,
        y: f32,
    },
    UnitDeployed {
        player_id: Uuid,
        unit_id: EntityId,
        kind: UnitKind,
    },
    UnitKilled {
        unit_id: EntityId,
        owner: Uuid,
        killer: Uuid,
    },
    TowerDestroyed {
        tower_id: EntityId,
        owner: Uuid,
    },
    EnemyKilled {
        enemy_id: EntityId,
        killer: Uuid,
    },
    WaveStarted {
        wave: u32,
        enemies_per_lane: u32,
    },
    AbilityUsed {
        player_id: Uuid,
        hero: HeroId,
        ability: String,
    },
    SubmissionRewarded {
        player_id: Uuid,
        problem_id: String,
        coding_score: f32,
        sabotage: bool,
        surge: bool,
    },
    BaseDamaged {
        player_id: Uuid,
        damage: f32,
        base_hp: f32,
    },
    MatchFinished {
        winner: Uuid,
    },
}

/// Final per-player numbers
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub hero: HeroId,
    pub base_hp: f32,
    pub units_killed: u32,
    pub towers_destroyed: u32,
    pub enemies_killed: u32,
    pub submissions_passed: u32,
}

/// Match results, sent to clients and handed to the result recorder
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub winner: Option<Uuid>,
    pub waves: u32,
    pub duration_ms: f64,
    pub players: Vec<PlayerSummary>,
    pub ended_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"place_tower","kind":"arrow","x":120.5,"y":300}"#).unwrap();
        assert!(matches!(msg, ClientMsg::PlaceTower { ref kind, .. } if kind == "arrow"));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"input","seq":7,"right":true}"#).unwrap();
        match msg {
            ClientMsg::Input { seq, payload, predicted, .. } => {
                assert_eq!(seq, 7);
                assert!(payload.right && !payload.left);
                assert!(predicted.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"use_ability"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::UseAbility));
    }

    #[test]
    fn clients_cannot_send_judge_verdicts() {
        let forged = r#"{"type":"submit_code","problem_id":"p1","status":"PASS","difficulty":"hard","execution_time_ms":1}"#;
        assert!(serde_json::from_str::<ClientMsg>(forged).is_err());
    }

    #[test]
    fn action_result_is_flattened() {
        let msg = ServerMsg::ActionResult {
            action: "use_ability",
            reply: ActionReply::from(Err(crate::game::actions::ActionError::OnCooldown { remaining_ms: 500 })),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "action_result");
        assert_eq!(json["action"], "use_ability");
        assert_eq!(json["success"], false);
        assert_eq!(json["remaining_cooldown_ms"], 500);
    }

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(GameEvent::WaveStarted {
            wave: 3,
            enemies_per_lane: 11,
        })
        .unwrap();
        assert_eq!(json["event_type"], "wave_started");
        assert_eq!(json["enemies_per_lane"], 11);
    }
}
