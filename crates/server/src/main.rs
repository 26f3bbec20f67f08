use std::{future, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use dispatch::{DeviceWriter, DispatchSink, HardwareSink, InteractiveSink, TraversalDispatcher};
use futures::{SinkExt, StreamExt};
use shared::protocol::CAPACITY_NOTICE;
use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, Interval},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod console;
mod session;

use app_state::AppState;
use config::{load_settings, SinkMode};
use session::SessionController;

const OUTBOUND_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let sink: Arc<dyn DispatchSink> = match settings.sink {
        SinkMode::Interactive => {
            let confirmations = console::spawn_line_feeder(tokio::io::stdin());
            Arc::new(InteractiveSink::new(
                confirmations,
                settings.confirmation_timeout(),
            ))
        }
        SinkMode::Hardware => Arc::new(HardwareSink::new(DeviceWriter::new(
            &settings.serial_device,
        ))),
    };
    let dispatcher = TraversalDispatcher::new(sink);
    let state = AppState::new(dispatcher, settings.session_options())
        .with_keepalive(settings.keepalive());

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(
        %addr,
        sink = state.dispatcher.sink_name(),
        min_real = settings.min_real,
        "guidance server listening (1 client only)"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        build_router(Arc::new(state)).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, peer))
}

async fn ws_connection(state: Arc<AppState>, mut socket: WebSocket, peer: SocketAddr) {
    let (outbound, mut outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let Ok(mut session) = SessionController::attach(&state, outbound) else {
        warn!(%peer, "rejecting client, session slot is taken");
        let _ = socket.send(Message::Text(CAPACITY_NOTICE.to_string())).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    info!(%peer, board = %session.board(), "client connected");

    let keepalive = state.keepalive;
    let (mut sender, mut receiver) = socket.split();
    let send_task = tokio::spawn(async move {
        let mut pings = keepalive.map(|period| interval_at(Instant::now() + period, period));
        loop {
            let message = tokio::select! {
                message = outbound_rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = next_ping(&mut pings) => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };
            let text = match serde_json::to_string(&message) {
                Ok(v) => v,
                Err(error) => {
                    warn!(%error, "failed to encode outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Any frame, pongs included, proves the peer is alive.
    let idle_limit = keepalive.map(|period| period * 2);
    loop {
        let next = match idle_limit {
            Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(
                        %peer,
                        idle_ms = limit.as_millis() as u64,
                        "client stopped answering pings"
                    );
                    break;
                }
            },
            None => receiver.next().await,
        };
        let Some(msg) = next else {
            break;
        };
        match msg {
            Ok(Message::Text(text)) => {
                info!(%peer, %text, "received");
                session.handle_text(&text).await;
                debug!(phase = ?session.phase(), "session phase");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                warn!(%peer, %error, "websocket closed with error");
                break;
            }
        }
    }

    session.disconnect().await;
    send_task.abort();
    info!(%peer, "client disconnected");
}

async fn next_ping(pings: &mut Option<Interval>) {
    match pings {
        Some(pings) => {
            pings.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
