use super::*;

use std::{io, sync::Mutex as StdMutex, time::Duration};

use async_trait::async_trait;
use axum::{body::Body, http::Request, http::StatusCode};
use dispatch::{packet, FrameWriter};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

use crate::session::SessionOptions;

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Clone, Default)]
struct RecordingWriter {
    frames: Arc<StdMutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl FrameWriter for RecordingWriter {
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.frames.lock().expect("frames").push(frame.to_vec());
        Ok(())
    }
}

fn app_state(writer: RecordingWriter) -> AppState {
    let dispatcher = TraversalDispatcher::new(Arc::new(HardwareSink::new(writer)));
    AppState::new(
        dispatcher,
        SessionOptions {
            min_real: 2,
            cancel_grace: Duration::from_millis(200),
        },
    )
}

fn test_state(writer: RecordingWriter) -> Arc<AppState> {
    Arc::new(app_state(writer))
}

async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/"))
        .await
        .expect("connect");
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("message in time")
            .expect("stream open")
            .expect("message");
        match msg {
            WsMessage::Text(text) => return text,
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn next_json(client: &mut Client) -> serde_json::Value {
    serde_json::from_str(&next_text(client).await).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_router(test_state(RecordingWriter::default()));
    let request = Request::get("/healthz").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn start_sends_route_frame_and_full_path() {
    let writer = RecordingWriter::default();
    let frames = Arc::clone(&writer.frames);
    let addr = spawn_server(test_state(writer)).await;
    let mut client = connect(addr).await;

    client
        .send(WsMessage::Text(
            serde_json::json!({
                "action": "start",
                "squares": { "1": "Real", "4": "Real", "7": "Real" }
            })
            .to_string(),
        ))
        .await
        .expect("send");

    assert_eq!(
        next_json(&mut client).await,
        serde_json::json!({ "full_path": [1, 4, 7, 10] })
    );
    let frames = frames.lock().expect("frames").clone();
    assert_eq!(frames.len(), 1);
    let payload = packet::decode(&frames[0]).expect("frame");
    assert_eq!(payload, [1, 4, 7, 10, 0, 0, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn retry_and_echo_round_trip() {
    let addr = spawn_server(test_state(RecordingWriter::default())).await;
    let mut client = connect(addr).await;

    client
        .send(WsMessage::Text(r#"{"action":"retry"}"#.to_string()))
        .await
        .expect("send");
    assert_eq!(
        next_json(&mut client).await,
        serde_json::json!({ "server_msg": "Board reset for retry" })
    );

    client
        .send(WsMessage::Text("ping from app".to_string()))
        .await
        .expect("send");
    assert_eq!(
        next_json(&mut client).await,
        serde_json::json!({ "server_msg": "ping from app" })
    );

    client
        .send(WsMessage::Text(r#"{"action":"start","squares":{}}"#.to_string()))
        .await
        .expect("send");
    let reply = next_json(&mut client).await;
    assert_eq!(reply["error"]["code"], "no_route");
}

#[tokio::test]
async fn second_client_is_rejected_until_first_leaves() {
    let addr = spawn_server(test_state(RecordingWriter::default())).await;
    let mut first = connect(addr).await;
    first
        .send(WsMessage::Text("hello".to_string()))
        .await
        .expect("send");
    assert_eq!(
        next_json(&mut first).await,
        serde_json::json!({ "server_msg": "hello" })
    );

    let mut second = connect(addr).await;
    assert_eq!(next_text(&mut second).await, CAPACITY_NOTICE);
    let closing = tokio::time::timeout(Duration::from_secs(5), second.next())
        .await
        .expect("close in time");
    assert!(matches!(closing, None | Some(Ok(WsMessage::Close(_))) | Some(Err(_))));

    first
        .send(WsMessage::Text("still here".to_string()))
        .await
        .expect("send");
    assert_eq!(
        next_json(&mut first).await,
        serde_json::json!({ "server_msg": "still here" })
    );

    first.close(None).await.expect("close");
    drop(first);

    let mut third = None;
    for _ in 0..50 {
        let mut candidate = connect(addr).await;
        let _ = candidate.send(WsMessage::Text("hello".to_string())).await;
        let text = next_text(&mut candidate).await;
        if text != CAPACITY_NOTICE {
            assert_eq!(
                serde_json::from_str::<serde_json::Value>(&text).expect("json"),
                serde_json::json!({ "server_msg": "hello" })
            );
            third = Some(candidate);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(third.is_some(), "slot was never released");
}

#[tokio::test]
async fn silent_client_loses_the_slot_after_missed_pings() {
    let state =
        app_state(RecordingWriter::default()).with_keepalive(Some(Duration::from_millis(100)));
    let addr = spawn_server(Arc::new(state)).await;

    let mut silent = connect(addr).await;
    silent
        .send(WsMessage::Text("hello".to_string()))
        .await
        .expect("send");
    assert_eq!(
        next_json(&mut silent).await,
        serde_json::json!({ "server_msg": "hello" })
    );

    // `silent` is never polled again, so server pings go unanswered.
    let mut attached = false;
    for _ in 0..100 {
        let mut candidate = connect(addr).await;
        let _ = candidate
            .send(WsMessage::Text("are you free".to_string()))
            .await;
        if next_text(&mut candidate).await != CAPACITY_NOTICE {
            attached = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(attached, "silent client kept the slot");
    drop(silent);
}
