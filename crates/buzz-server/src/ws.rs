// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live event feed for observers.
//!
//! Each connection owns one hub subscription. Hub events go out as JSON text
//! frames (`{"event": "...", "data": ...}`); the only thing a client may send
//! is a `snapshot` request, answered with the current ranking.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use buzz_core::OrderingEngine;
use buzz_proto::wire::{decode_request, encode_event};
use buzz_proto::{ClientRequest, HubEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::{self, Duration};
use tracing::{error, info, warn};

use crate::app::AppState;

type TaskResult<T> = std::result::Result<T, JoinError>;

pub(crate) async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !origin_allowed(&state, &headers) {
        let origin = headers
            .get("origin")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<missing>");
        warn!(?addr, origin = %origin, "origin rejected");
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    let mut subscription = state.engine.hub().subscribe();
    let subscriber = subscription.id();
    info!(?peer, subscriber, "observer connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);

    // Writer task: all outbound frames (events, snapshots, pongs, pings)
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Hub -> WS: a slow socket only backs up this task; the hub marks the
    // subscription lagged and sends `resync` once it drains.
    let hub_tx = out_tx.clone();
    let hub_to_ws = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            let text = encode_event(&event)?;
            if hub_tx.send(Message::Text(text.into())).await.is_err() {
                return Ok::<(), anyhow::Error>(());
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    // WS -> engine: snapshot requests and keepalive
    let engine = state.engine.clone();
    let req_tx = out_tx.clone();
    let ws_to_engine = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => match decode_request(text.as_str()) {
                    Ok(ClientRequest::Snapshot) => {
                        let Some(reply) = snapshot_frame(&engine, peer).await else {
                            continue;
                        };
                        if req_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(?err, ?peer, "ignoring malformed request"),
                },
                Ok(Message::Ping(payload)) => {
                    let _ = req_tx.send(Message::Pong(payload)).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Binary(_)) => {
                    warn!(?peer, "ignoring binary frame");
                }
                Err(err) => {
                    warn!(?err, ?peer, "ws recv error");
                    break;
                }
                Ok(Message::Pong(_)) => {}
            }
        }
    });

    let ping_tx = out_tx.clone();
    let ping = tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(30));
        // first tick is immediate
        interval.tick().await;
        loop {
            interval.tick().await;
            if ping_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                break;
            }
        }
    });

    enum EndReason {
        Client(TaskResult<()>),
        Hub(TaskResult<Result<()>>),
        Writer(TaskResult<()>),
    }

    let mut ws_to_engine = ws_to_engine;
    let mut hub_to_ws = hub_to_ws;
    let mut writer = writer;

    let reason: EndReason = tokio::select! {
        res = &mut ws_to_engine => EndReason::Client(res),
        res = &mut hub_to_ws => EndReason::Hub(res),
        res = &mut writer => EndReason::Writer(res),
    };

    if matches!(reason, EndReason::Hub(_)) {
        warn!(?peer, subscriber, "event feed ended; closing websocket");
        let _ = time::timeout(
            Duration::from_millis(250),
            out_tx.send(Message::Close(Some(CloseFrame {
                code: axum::extract::ws::close_code::ERROR,
                reason: "event feed ended".into(),
            }))),
        )
        .await;
    }

    ping.abort();
    ws_to_engine.abort();
    hub_to_ws.abort();
    drop(out_tx);
    // the aborted hub task drops the subscription; this covers a task that already returned
    state.engine.hub().unsubscribe(subscriber);

    if !matches!(reason, EndReason::Writer(_)) {
        match time::timeout(Duration::from_secs(1), &mut writer).await {
            Ok(res) => log_void_task_result("writer", peer, res),
            Err(_) => {
                writer.abort();
                log_void_task_result("writer", peer, writer.await);
            }
        }
    }

    match reason {
        EndReason::Client(res) => {
            log_void_task_result("ws_to_engine", peer, res);
            log_result_task_result("hub_to_ws", peer, hub_to_ws.await);
        }
        EndReason::Hub(res) => {
            log_result_task_result("hub_to_ws", peer, res);
            log_void_task_result("ws_to_engine", peer, ws_to_engine.await);
        }
        EndReason::Writer(res) => {
            log_void_task_result("writer", peer, res);
            log_void_task_result("ws_to_engine", peer, ws_to_engine.await);
            log_result_task_result("hub_to_ws", peer, hub_to_ws.await);
        }
    }
    log_void_task_result("ping", peer, ping.await);
    info!(?peer, subscriber, "observer disconnected");
}

async fn snapshot_frame(engine: &OrderingEngine, peer: SocketAddr) -> Option<Message> {
    let engine = engine.clone();
    let event = match tokio::task::spawn_blocking(move || engine.snapshot()).await {
        Ok(Ok(event)) => event,
        Ok(Err(err)) => {
            warn!(%err, ?peer, "snapshot failed");
            return None;
        }
        Err(err) => {
            log_join_error("snapshot", peer, err);
            return None;
        }
    };
    encode_frame(&event, peer)
}

fn encode_frame(event: &HubEvent, peer: SocketAddr) -> Option<Message> {
    match encode_event(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(err) => {
            error!(?err, ?peer, event = event.event_name(), "failed to encode event");
            None
        }
    }
}

fn origin_allowed(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(allow) = &state.allow_origins else {
        return true;
    };
    headers
        .get("origin")
        .and_then(|origin| origin.to_str().ok())
        .is_some_and(|origin| allow.contains(origin))
}

fn log_void_task_result(name: &'static str, peer: SocketAddr, res: TaskResult<()>) {
    if let Err(err) = res {
        log_join_error(name, peer, err);
    }
}

fn log_result_task_result(name: &'static str, peer: SocketAddr, res: TaskResult<Result<()>>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(?peer, ?err, "{name} task returned error"),
        Err(err) => log_join_error(name, peer, err),
    }
}

fn log_join_error(name: &'static str, peer: SocketAddr, err: JoinError) {
    if err.is_cancelled() {
        return;
    }
    if err.is_panic() {
        error!(?peer, ?err, "{name} task panicked");
    } else {
        warn!(?peer, ?err, "{name} task failed");
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use buzz_core::AdminGate;

    fn state(origins: &[&str]) -> AppState {
        let origins: Vec<String> = origins.iter().map(ToString::to_string).collect();
        AppState::new(OrderingEngine::in_memory(), AdminGate::new("t"), &origins)
    }

    fn with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("origin", HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn origin_check_honours_allow_list() {
        let state = state(&["http://localhost:5173"]);
        assert!(origin_allowed(&state, &with_origin("http://localhost:5173")));
        assert!(!origin_allowed(&state, &with_origin("http://evil.example")));
        assert!(!origin_allowed(&state, &HeaderMap::new()));
    }

    #[test]
    fn wildcard_accepts_any_origin() {
        let state = state(&["*"]);
        assert!(origin_allowed(&state, &with_origin("http://evil.example")));
        assert!(origin_allowed(&state, &HeaderMap::new()));
    }

    #[tokio::test]
    async fn snapshot_frame_carries_current_ranking() {
        let engine = OrderingEngine::in_memory();
        engine.submit("Alpha", 1000).unwrap();
        engine.submit("Beta", 500).unwrap();
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let Some(Message::Text(text)) = snapshot_frame(&engine, peer).await else {
            panic!("expected a text frame");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["event"], "snapshot");
        assert_eq!(json["data"][0]["teamName"], "Beta");
        assert_eq!(json["data"][1]["teamName"], "Alpha");
    }
}
