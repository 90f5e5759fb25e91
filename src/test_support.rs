//! In-process fake of the clipboard backend for tests.
//!
//! Serves the HTTP endpoints the client consumes plus the `/ws/{username}`
//! push channel. Frames queued with [`FakeBackend::push_frame`] are broadcast
//! to every connected socket; text frames received from clients are recorded.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

pub const KNOWN_USER: &str = "alice";
const CLOSE_SIGNAL: &str = "\u{0}close";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub endpoint: String,
    pub username: String,
    pub text: String,
    pub authorization: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    submissions: Vec<Submission>,
    latest: Option<(u64, String)>,
    latest_requests: usize,
    history: Vec<String>,
    copied: Vec<String>,
    reject_submissions: bool,
    close_on_connect: bool,
    connections: Vec<HashMap<String, String>>,
    received_frames: Vec<String>,
}

#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    frames: broadcast::Sender<String>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        let (frames, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            frames,
        }
    }
}

#[derive(Deserialize)]
struct TextBody {
    text: String,
}

impl FakeBackend {
    /// Bind to an ephemeral port and serve in the background.
    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/api/submit_copied_text/{username}", post(submit_copied))
            .route("/api/submit/{username}", post(submit_history))
            .route("/api/latest/{username}", get(latest))
            .route("/api/history/{username}", get(history))
            .route("/ws/{username}", get(ws_upgrade))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_texts(&self) -> Vec<String> {
        self.submissions().into_iter().map(|s| s.text).collect()
    }

    pub fn set_reject_submissions(&self, reject: bool) {
        self.state.lock().unwrap().reject_submissions = reject;
    }

    /// Complete each push handshake, then close the socket straight away.
    pub fn set_close_on_connect(&self, close: bool) {
        self.state.lock().unwrap().close_on_connect = close;
    }

    pub fn set_latest(&self, marker: u64, text: &str) {
        self.state.lock().unwrap().latest = Some((marker, text.to_string()));
    }

    pub fn latest_requests(&self) -> usize {
        self.state.lock().unwrap().latest_requests
    }

    pub fn set_history(&self, history: Vec<String>, copied: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        state.history = history;
        state.copied = copied;
    }

    /// Query parameters of every push connection accepted so far.
    pub fn connections(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().connections.clone()
    }

    pub fn received_frames(&self) -> Vec<String> {
        self.state.lock().unwrap().received_frames.clone()
    }

    pub fn push_frame(&self, frame: &str) {
        let _ = self.frames.send(frame.to_string());
    }

    /// Close every open push socket from the server side.
    pub fn drop_connections(&self) {
        let _ = self.frames.send(CLOSE_SIGNAL.to_string());
    }

    fn record_submission(&self, endpoint: &str, username: String, headers: &HeaderMap, text: String) -> Response {
        let mut state = self.state.lock().unwrap();
        if username != KNOWN_USER {
            return (StatusCode::NOT_FOUND, "User not found").into_response();
        }
        if state.reject_submissions {
            return Json(json!({"status": "error", "message": "Submissions disabled"})).into_response();
        }

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        state.submissions.push(Submission {
            endpoint: endpoint.to_string(),
            username,
            text: text.clone(),
            authorization: header("authorization"),
            client_id: header("x-clipsync-client"),
        });
        if endpoint == "submit" {
            state.history.push(text);
        } else {
            state.copied.push(text);
        }

        Json(json!({"status": "success"})).into_response()
    }
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn submit_copied(
    State(backend): State<FakeBackend>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TextBody>,
) -> Response {
    backend.record_submission("submit_copied_text", username, &headers, body.text)
}

async fn submit_history(
    State(backend): State<FakeBackend>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TextBody>,
) -> Response {
    backend.record_submission("submit", username, &headers, body.text)
}

async fn latest(State(backend): State<FakeBackend>, Path(username): Path<String>) -> Response {
    let mut state = backend.state.lock().unwrap();
    if username != KNOWN_USER {
        return (StatusCode::NOT_FOUND, "User not found").into_response();
    }
    state.latest_requests += 1;

    match &state.latest {
        Some((marker, text)) => {
            Json(json!({"status": "success", "update_marker": marker, "text": text})).into_response()
        }
        None => Json(json!({"status": "success", "update_marker": null})).into_response(),
    }
}

async fn history(State(backend): State<FakeBackend>, Path(username): Path<String>) -> Response {
    let state = backend.state.lock().unwrap();
    if username != KNOWN_USER {
        return (StatusCode::NOT_FOUND, "User not found").into_response();
    }

    Json(json!({
        "status": "success",
        "history": state.history,
        "copied_text_history": state.copied,
    }))
    .into_response()
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(backend): State<FakeBackend>,
    Path(_username): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    // Subscribe before the handshake completes so no frame pushed after connect is missed.
    let outbound = backend.frames.subscribe();
    backend.state.lock().unwrap().connections.push(params);
    ws.on_upgrade(move |socket| serve_socket(socket, backend, outbound))
}

async fn serve_socket(socket: WebSocket, backend: FakeBackend, mut outbound: broadcast::Receiver<String>) {
    let (mut tx, mut rx) = socket.split();
    let close_now = backend.state.lock().unwrap().close_on_connect;
    if close_now {
        let _ = tx.send(Message::Close(None)).await;
        return;
    }
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Ok(frame) if frame == CLOSE_SIGNAL => {
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }
                Ok(frame) => {
                    if tx.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    backend.state.lock().unwrap().received_frames.push(text.as_str().to_string());
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
