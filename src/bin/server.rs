use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use silent_library::config::GameSettings;
use silent_library::constants::{DEFAULT_TIME_KEY, TICK_MS, TICK_RATE};
use silent_library::engine::{AutopilotProfile, GameSession, GameSessionOptions};
use silent_library::level::Level;
use silent_library::logging::{emit_log, log_runtime_events, LogScope};
use silent_library::server_protocol::{
    merge_input, parse_client_message, take_tick_input, ParsedClientMessage, ServerMessage,
};
use silent_library::time_store::TimeStore;
use silent_library::types::{GameOverReason, GameSummary, PlayerInput};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    session: Option<GameSession>,
    pending_input: PlayerInput,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    settings: GameSettings,
    level: Level,
    time_store: TimeStore,
}

impl ServerState {
    fn new(settings: GameSettings, level: Level, time_store: TimeStore) -> Self {
        Self {
            clients: HashMap::new(),
            settings,
            level,
            time_store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BestTimeQuery {
    key: Option<String>,
}

#[tokio::main]
async fn main() {
    let scope = LogScope::session("server");
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let best_time_path = std::env::var("BEST_TIME_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/best-time.json"));

    let settings = match std::env::var("SILENT_LIBRARY_CONFIG") {
        Ok(path) => GameSettings::load(&PathBuf::from(path)),
        Err(_) => Ok(GameSettings::default()),
    };
    let level = match std::env::var("SILENT_LIBRARY_LEVEL") {
        Ok(path) => Level::load(&PathBuf::from(path)),
        Err(_) => Ok(Level::library()),
    };
    let checked = settings.and_then(|settings| {
        let level = level?;
        settings.validate_for_level(&level)?;
        Ok((settings, level))
    });
    let (settings, level) = match checked {
        Ok(inputs) => inputs,
        Err(error) => {
            emit_log(
                "error",
                "config_load_failed",
                &scope,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };

    emit_log(
        "info",
        "server_starting",
        &scope,
        None,
        json!({
            "port": port,
            "level": level.name,
            "bestTimePath": best_time_path.to_string_lossy(),
        }),
    );
    let state = Arc::new(Mutex::new(ServerState::new(
        settings,
        level,
        TimeStore::new(best_time_path),
    )));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/best-time", get(best_time_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        emit_log(
            "info",
            "static_root",
            &scope,
            None,
            json!({ "path": static_dir.to_string_lossy() }),
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        emit_log("warn", "static_root_missing", &scope, None, json!({}));
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            emit_log(
                "error",
                "bind_failed",
                &scope,
                None,
                json!({ "addr": bind_addr, "error": error.to_string() }),
            );
            std::process::exit(1);
        }
    };

    emit_log("info", "server_listening", &scope, None, json!({ "port": port }));
    if let Err(error) = axum::serve(listener, app).await {
        emit_log(
            "error",
            "server_failed",
            &scope,
            None,
            json!({ "error": error.to_string() }),
        );
        std::process::exit(1);
    }
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("dist/client"), PathBuf::from("public")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn best_time_handler(
    State(state): State<SharedState>,
    Query(query): Query<BestTimeQuery>,
) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(
        guard
            .time_store
            .build_response(best_time_key(query.key.as_deref())),
    )
}

fn best_time_key(raw: Option<&str>) -> &str {
    match raw.map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => DEFAULT_TIME_KEY,
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                session: None,
                pending_input: PlayerInput::default(),
            },
        );
    }
    emit_log(
        "info",
        "client_connected",
        &LogScope::session(&client_id),
        None,
        json!({}),
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    match message {
        ParsedClientMessage::Hello {
            seed,
            autopilot,
            skip_start_screen,
        } => handle_hello(&mut guard, client_id, seed, autopilot, skip_start_screen),
        ParsedClientMessage::Input(input) => {
            let Some(client) = guard.clients.get_mut(client_id) else {
                return;
            };
            if client.session.is_none() {
                drop(guard);
                send_error_to_client(&state, client_id, "send hello first").await;
                return;
            }
            merge_input(&mut client.pending_input, input);
        }
        ParsedClientMessage::Quit => {
            if let Some(session) = guard
                .clients
                .get_mut(client_id)
                .and_then(|client| client.session.as_mut())
            {
                session.quit();
            }
        }
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &ServerMessage::Pong { t },
                QueuePolicy::DropOnFull,
            );
        }
    }
}

fn handle_hello(
    state: &mut ServerState,
    client_id: &str,
    seed: Option<u32>,
    autopilot: bool,
    skip_start_screen: bool,
) {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    let mut settings = state.settings.clone();
    settings.session.skip_start_screen |= skip_start_screen;
    let session = GameSession::new(
        settings,
        state.level.clone(),
        GameSessionOptions {
            seed,
            autopilot: autopilot.then(AutopilotProfile::default),
        },
    );
    let session_id = make_id("session");
    let welcome = ServerMessage::Welcome {
        session_id: session_id.clone(),
        level: state.level.name.clone(),
        tick_rate: TICK_RATE,
        best_time: state.time_store.build_response(DEFAULT_TIME_KEY),
    };

    let Some(client) = state.clients.get_mut(client_id) else {
        return;
    };
    let replaced = client.session.replace(session).is_some();
    client.pending_input = PlayerInput::default();
    emit_log(
        "info",
        "session_started",
        &LogScope::session(client_id),
        None,
        json!({
            "sessionId": session_id,
            "seed": seed,
            "autopilot": autopilot,
            "replaced": replaced,
        }),
    );
    send_to_client(state, client_id, &welcome, QueuePolicy::DisconnectOnFull);
}

async fn handle_disconnect(state: SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    disconnect_client_internal(&mut guard, client_id);
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    let Some(client) = state.clients.remove(client_id) else {
        return;
    };
    let _ = client.tx.try_send(OutboundMessage::Close {
        code: 1000,
        reason: "closed".to_string(),
    });
    let ticks = client.session.as_ref().map(GameSession::tick);
    emit_log(
        "info",
        "client_disconnected",
        &LogScope::session(client_id),
        ticks,
        json!({ "hadSession": ticks.is_some() }),
    );
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_sessions(&mut guard);
        }
    });
}

fn tick_sessions(state: &mut ServerState) {
    let client_ids: Vec<String> = state.clients.keys().cloned().collect();
    for client_id in client_ids {
        tick_client(state, &client_id);
    }
}

fn tick_client(state: &mut ServerState, client_id: &str) {
    let (snapshot, summary) = {
        let Some(client) = state.clients.get_mut(client_id) else {
            return;
        };
        let input = take_tick_input(&mut client.pending_input);
        let Some(session) = client.session.as_mut() else {
            return;
        };
        if !session.is_ended() {
            session.step(TICK_MS, &input);
        }
        let snapshot = session.build_snapshot(true);
        let summary = session.is_ended().then(|| session.build_summary());
        (snapshot, summary)
    };

    log_runtime_events(
        &LogScope::session(client_id),
        snapshot.tick,
        &snapshot.events,
    );
    send_to_client(
        state,
        client_id,
        &ServerMessage::State { snapshot },
        QueuePolicy::DropOnFull,
    );

    let Some(summary) = summary else {
        return;
    };
    let new_record = record_summary(&mut state.time_store, &summary, client_id);
    emit_log(
        "info",
        "session_finished",
        &LogScope::session(client_id),
        None,
        json!({
            "reason": summary.reason,
            "timerSecs": summary.timer_secs,
            "timesCaught": summary.times_caught,
            "booksCompleted": summary.books_completed,
            "newRecord": new_record,
        }),
    );
    let message = ServerMessage::GameOver {
        summary,
        new_record,
        best_time: state.time_store.build_response(DEFAULT_TIME_KEY),
    };
    if let Some(client) = state.clients.get_mut(client_id) {
        client.session = None;
        client.pending_input = PlayerInput::default();
    }
    send_to_client(state, client_id, &message, QueuePolicy::DisconnectOnFull);
}

/// Stores the run time when the player escaped. Returns whether it beat the
/// previous best.
fn record_summary(store: &mut TimeStore, summary: &GameSummary, client_id: &str) -> bool {
    if summary.reason != GameOverReason::Escaped {
        return false;
    }
    match store.record_best(DEFAULT_TIME_KEY, summary.timer_secs) {
        Ok(improved) => improved,
        Err(error) => {
            emit_log(
                "error",
                "best_time_write_failed",
                &LogScope::session(client_id),
                None,
                json!({ "error": error.to_string() }),
            );
            false
        }
    }
}

fn send_to_client(
    state: &mut ServerState,
    client_id: &str,
    message: &ServerMessage,
    policy: QueuePolicy,
) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(error) => {
            emit_log(
                "error",
                "message_serialize_failed",
                &LogScope::session(client_id),
                None,
                json!({ "error": error.to_string() }),
            );
            return;
        }
    };
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client.tx.try_send(OutboundMessage::Text(payload)).is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_client_internal(state, client_id);
    }
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &ServerMessage::Error {
            message: message.to_string(),
        },
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
