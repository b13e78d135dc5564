//! Websocket transport for the aviator engine.
//!
//! One connection per player. The tick task and every command handler
//! lock the same engine mutex, so inbound commands are serialized
//! against the multiplier clock. Broadcasts fan out through a tokio
//! broadcast channel; per-connection responses go through a dedicated
//! mpsc writer.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use aviator_engine::{CrashEngine, EngineConfig, EngineEvent};
use aviator_types::api::{ClientMessage, CommandResponse, InitMessage};
use aviator_types::EngineError;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{info, warn};

#[derive(Clone, Debug)]
struct ServerConfig {
    host: String,
    port: u16,
    tick_ms: u64,
    engine: EngineConfig,
}

impl ServerConfig {
    fn from_env() -> Self {
        let defaults = EngineConfig::default();
        Self {
            host: std::env::var("AVIATOR_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("AVIATOR_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(9200),
            tick_ms: read_ms("AVIATOR_TICK_MS", 100),
            engine: EngineConfig {
                wait_ms: read_ms("AVIATOR_WAIT_MS", defaults.wait_ms),
                crash_pause_ms: read_ms("AVIATOR_CRASH_PAUSE_MS", defaults.crash_pause_ms),
                multiplier_step: defaults.multiplier_step,
                history_cap: read_usize("AVIATOR_HISTORY_CAP", defaults.history_cap),
                starting_balance: read_u64("AVIATOR_STARTING_BALANCE", defaults.starting_balance),
            },
        }
    }
}

fn read_ms(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(fallback)
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<CrashEngine>>,
    broadcaster: broadcast::Sender<EngineEvent>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut broadcast_rx = state.broadcaster.subscribe();

    // Assign a username and register the session before anything else.
    let username = {
        let mut engine = state.engine.lock().unwrap();
        let username = assign_username(&engine);
        engine.join(&username);
        send_json(&tx, &InitMessage::new(username.as_str()));
        send_json(&tx, &engine.state_snapshot(Instant::now()));
        send_json(&tx, &engine.history_message());
        username
    };
    info!(%username, "player connected");

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let broadcast_task = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                let payload = match &event {
                    EngineEvent::State(state) => serde_json::to_string(state),
                    EngineEvent::History(history) => serde_json::to_string(history),
                };
                if let Ok(payload) = payload {
                    let _ = tx.send(Message::Text(payload));
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(inbound) => handle_inbound(inbound, &username, &state, &tx),
                Err(err) => {
                    warn!(%username, ?err, "invalid inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Session state (balance, preferences) outlives the connection.
    info!(%username, "player disconnected");
    write_task.abort();
    broadcast_task.abort();
}

fn handle_inbound(
    inbound: ClientMessage,
    username: &str,
    state: &AppState,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let mut engine = state.engine.lock().unwrap();
    let response = match inbound {
        ClientMessage::PlaceBet {
            amount,
            auto_cashout,
        } => match engine.handle_place_bet(username, amount, auto_cashout) {
            Ok(bet_id) => ack(engine.balance(username), Some(bet_id)),
            Err(err) => error_response(err),
        },
        ClientMessage::CancelBet { bet_id } => match engine.handle_cancel_bet(username, bet_id) {
            Ok(_) => ack(engine.balance(username), None),
            Err(err) => error_response(err),
        },
        ClientMessage::CashOut => match engine.handle_cash_out(username) {
            Ok((multiplier, payout)) => {
                info!(%username, multiplier, payout, "cash out");
                ack(engine.balance(username), None)
            }
            Err(err) => error_response(err),
        },
        ClientMessage::SetAutoBet { enabled, amount } => {
            engine.set_auto_bet(username, enabled, amount);
            ack(engine.balance(username), None)
        }
        ClientMessage::SetAutoCashout { enabled, target } => {
            engine.set_auto_cashout(username, enabled, target);
            ack(engine.balance(username), None)
        }
    };
    drop(engine);
    send_json(tx, &response);
}

fn ack(balance: Option<u64>, bet_id: Option<u64>) -> CommandResponse {
    CommandResponse::Ack { balance, bet_id }
}

fn error_response(err: EngineError) -> CommandResponse {
    CommandResponse::Error {
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

fn send_json<T: serde::Serialize>(tx: &mpsc::UnboundedSender<Message>, value: &T) {
    if let Ok(payload) = serde_json::to_string(value) {
        let _ = tx.send(Message::Text(payload));
    }
}

/// Assign a `Player_NNNNN` username, re-rolling on the rare collision.
fn assign_username(engine: &CrashEngine) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!("Player_{:05}", rng.gen_range(0..100_000));
        if !engine.has_player(&candidate) {
            return candidate;
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let engine = Arc::new(Mutex::new(CrashEngine::new(config.engine)));
    let (broadcaster, _) = broadcast::channel::<EngineEvent>(1024);

    let state = AppState {
        engine: engine.clone(),
        broadcaster: broadcaster.clone(),
    };

    // Tick loop: the only writer cadence; command handlers serialize
    // against it through the engine mutex.
    let tick_ms = config.tick_ms;
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(tick_ms));
        loop {
            interval.tick().await;
            let events = {
                let mut engine = engine.lock().unwrap();
                engine.tick(Instant::now())
            };
            for event in events {
                let _ = broadcaster.send(event);
            }
        }
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "aviator server listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
