//! Wire messages exchanged with the websocket transport.
//!
//! The engine broadcasts the full current bet list and multiplier on every
//! tick, so clients are pure renderers of the latest `game_state` message
//! and never reconstruct state locally. Command rejections travel back on
//! the originating connection only, as an `error` envelope.

use crate::game::{Bet, RoundRecord};
use serde::{Deserialize, Serialize};

/// Player commands, one websocket connection per player. The player is
/// implicit (the connection's assigned username), so no id travels on
/// the wire.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "place_bet")]
    PlaceBet {
        amount: u64,
        /// Target multiplier to arm auto-cashout for this bet.
        #[serde(rename = "autoCashout", default)]
        auto_cashout: Option<f64>,
    },
    #[serde(rename = "cancel_bet")]
    CancelBet {
        #[serde(rename = "betId")]
        bet_id: u64,
    },
    /// Cash out the caller's own active bet at the current multiplier.
    #[serde(rename = "cash_out")]
    CashOut,
    #[serde(rename = "set_auto_bet")]
    SetAutoBet { enabled: bool, amount: u64 },
    #[serde(rename = "set_auto_cashout")]
    SetAutoCashout { enabled: bool, target: f64 },
}

/// One bet in the broadcast bet list.
#[derive(Clone, Debug, Serialize)]
pub struct BetView {
    pub username: String,
    pub amount: u64,
    /// Realized multiplier once settled, absent while the bet is live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(rename = "cashedOut")]
    pub cashed_out: bool,
}

impl From<&Bet> for BetView {
    fn from(bet: &Bet) -> Self {
        Self {
            username: bet.player.clone(),
            amount: bet.amount,
            multiplier: bet.realized_multiplier,
            cashed_out: bet.is_win(),
        }
    }
}

/// Authoritative state snapshot, broadcast on every tick and transition.
#[derive(Clone, Debug, Serialize)]
pub struct GameStateMessage {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub state: &'static str,
    #[serde(rename = "roundId")]
    pub round_id: u64,
    pub multiplier: f64,
    /// Seconds until the next round starts. Present while waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u64>,
    pub bets: Vec<BetView>,
    /// Revealed once the round has crashed.
    #[serde(rename = "crashPoint", skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
}

impl GameStateMessage {
    pub const TYPE: &'static str = "game_state";
}

/// Sent once per connection, carrying the assigned username.
#[derive(Clone, Debug, Serialize)]
pub struct InitMessage {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub username: String,
}

impl InitMessage {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            msg_type: "init",
            username: username.into(),
        }
    }
}

/// A finalized round as published for audit. Everything needed to
/// recompute the crash point is included.
#[derive(Clone, Debug, Serialize)]
pub struct RoundView {
    pub id: u64,
    #[serde(rename = "crashPoint")]
    pub crash_point: f64,
    #[serde(rename = "serverSeed")]
    pub server_seed: String,
    #[serde(rename = "clientSeed")]
    pub client_seed: String,
    pub nonce: u64,
    #[serde(rename = "scalingFactor")]
    pub scaling_factor: f64,
    #[serde(rename = "startedAtMs")]
    pub started_at_ms: u64,
    pub bets: Vec<BetView>,
}

impl From<&RoundRecord> for RoundView {
    fn from(record: &RoundRecord) -> Self {
        Self {
            id: record.id,
            crash_point: record.crash_point,
            server_seed: record.server_seed.clone(),
            client_seed: record.client_seed.clone(),
            nonce: record.nonce,
            scaling_factor: record.scaling_factor,
            started_at_ms: record.started_at_ms,
            bets: record.bets.iter().map(BetView::from).collect(),
        }
    }
}

/// Recent finalized rounds, newest first.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub rounds: Vec<RoundView>,
}

impl HistoryMessage {
    pub const TYPE: &'static str = "round_history";
}

/// Per-connection response to a command.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum CommandResponse {
    #[serde(rename = "ack")]
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        balance: Option<u64>,
        #[serde(rename = "betId", skip_serializing_if = "Option::is_none")]
        bet_id: Option<u64>,
    },
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_bet_deserializes() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"place_bet","amount":50,"autoCashout":2.0}"#).unwrap();
        match msg {
            ClientMessage::PlaceBet {
                amount,
                auto_cashout,
            } => {
                assert_eq!(amount, 50);
                assert_eq!(auto_cashout, Some(2.0));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        // autoCashout is optional
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"place_bet","amount":10}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::PlaceBet {
                amount: 10,
                auto_cashout: None
            }
        ));
    }

    #[test]
    fn test_cash_out_deserializes_without_fields() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"cash_out"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CashOut));
    }

    #[test]
    fn test_game_state_wire_shape() {
        let state = GameStateMessage {
            msg_type: GameStateMessage::TYPE,
            state: "running",
            round_id: 7,
            multiplier: 1.42,
            countdown: None,
            bets: vec![BetView {
                username: "Player_12345".to_string(),
                amount: 50,
                multiplier: None,
                cashed_out: false,
            }],
            crash_point: None,
        };
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "game_state");
        assert_eq!(json["state"], "running");
        assert_eq!(json["roundId"], 7);
        assert_eq!(json["bets"][0]["username"], "Player_12345");
        assert_eq!(json["bets"][0]["cashedOut"], false);
        // Absent fields are omitted, not null.
        assert!(json.get("countdown").is_none());
        assert!(json.get("crashPoint").is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let response = CommandResponse::Error {
            code: "INSUFFICIENT_BALANCE".to_string(),
            message: "insufficient balance: need 100, have 40".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("INSUFFICIENT_BALANCE"));
    }
}
