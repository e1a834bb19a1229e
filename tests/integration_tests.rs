//! End-to-end integration tests: WebSocket connection and full
//! message → operation → reply cycle through the running server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use unistate_protocol::Message as TaggedMessage;
use unistate_router::{
    Operation, OperationCx, OperationRegistry, RouterConfig, RouterService, UnknownTagPolicy,
};
use unistate_transport::{TransportConfig, TransportServer};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Sends back the current value of `state[key]`.
struct Read;

#[derive(Deserialize)]
struct ReadParams {
    key: String,
}

impl Operation for Read {
    type Params = ReadParams;

    fn tag(&self) -> &'static str {
        "read"
    }

    async fn invoke(&self, cx: &mut OperationCx<'_>, params: ReadParams) -> anyhow::Result<()> {
        let value = cx.state().get(&params.key).cloned().unwrap_or(Value::Null);
        cx.send(TaggedMessage::assign(params.key, value)).await?;
        Ok(())
    }
}

/// Start a test server on a random port.
async fn start_test_server(config: RouterConfig) -> TransportServer {
    let mut registry = OperationRegistry::with_builtins();
    registry.register(Read);
    let service = RouterService::new(registry, config);

    let transport_config = TransportConfig {
        port: 0, // OS-assigned
        hostname: "127.0.0.1".into(),
        max_connections: Some(16),
        ..TransportConfig::default()
    };

    TransportServer::start(transport_config, service).await.unwrap()
}

async fn connect(server: &TransportServer) -> WsStream {
    let url = format!("ws://127.0.0.1:{}/ws", server.port());
    let (ws, _) = connect_async(&url).await.expect("Failed to connect");
    ws
}

async fn send_text(ws: &mut WsStream, text: &str) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn send_json(ws: &mut WsStream, value: Value) {
    send_text(ws, &serde_json::to_string(&value).unwrap()).await;
}

/// Read the next message from the server.
async fn recv_json(ws: &mut WsStream) -> Value {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timeout waiting for message")
        .expect("Stream ended")
        .expect("WebSocket error");

    let text = msg.into_text().unwrap();
    serde_json::from_str(text.as_str()).unwrap()
}

/// Assert that nothing arrives for a short while.
async fn assert_silent(ws: &mut WsStream) {
    let next = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "expected no message, got {next:?}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn axpy_round_trip() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut ws = connect(&server).await;

    send_json(&mut ws, json!({"tag": "axpy", "a": 2, "x": [1, 2, 3], "y": [10, 20, 30]})).await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(
        reply,
        json!({"tag": "assign", "key": "result_vector", "value": [12, 24, 36]})
    );
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn broken_operation_keeps_connection_open() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut ws = connect(&server).await;

    send_json(&mut ws, json!({"tag": "broken"})).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["tag"], "error");
    assert!(!err["error"].as_str().unwrap().is_empty());
    assert!(!err["details"].as_str().unwrap().is_empty());

    send_json(&mut ws, json!({"tag": "axpy", "a": 1, "x": [1], "y": [2]})).await;
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply["value"], json!([3]));
}

#[tokio::test]
async fn private_tag_rejected() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut ws = connect(&server).await;

    send_json(&mut ws, json!({"tag": "_private"})).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["tag"], "error");
    assert_eq!(err["kind"], "forbidden");
    assert!(err["error"].as_str().unwrap().contains("not allowed"));
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn malformed_input_reported_and_loop_continues() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut ws = connect(&server).await;

    send_text(&mut ws, "{{{ definitely not json").await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["tag"], "error");
    assert_eq!(err["kind"], "malformed");
    assert!(err["error"].as_str().unwrap().contains("parse"));

    send_json(&mut ws, json!({"tag": "assign", "key": "k", "value": 5})).await;
    send_json(&mut ws, json!({"tag": "read", "key": "k"})).await;
    assert_eq!(recv_json(&mut ws).await["value"], 5);
}

#[tokio::test]
async fn unknown_tag_is_silent() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut ws = connect(&server).await;

    send_json(&mut ws, json!({"tag": "nope"})).await;
    send_json(&mut ws, json!({"tag": "read", "key": "missing"})).await;

    // The first thing back is the reply to `read`.
    let reply = recv_json(&mut ws).await;
    assert_eq!(reply, json!({"tag": "assign", "key": "missing", "value": null}));
}

#[tokio::test]
async fn unknown_tag_reported_when_enabled() {
    let config = RouterConfig {
        unknown_tags: UnknownTagPolicy::Notify,
    };
    let server = start_test_server(config).await;
    let mut ws = connect(&server).await;

    send_json(&mut ws, json!({"tag": "nope"})).await;
    let err = recv_json(&mut ws).await;
    assert_eq!(err["kind"], "not_found");
}

#[tokio::test]
async fn state_is_per_connection() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut alice = connect(&server).await;
    let mut bob = connect(&server).await;

    send_json(&mut alice, json!({"tag": "assign", "key": "k", "value": 5})).await;
    send_json(&mut alice, json!({"tag": "read", "key": "k"})).await;
    assert_eq!(recv_json(&mut alice).await["value"], 5);

    send_json(&mut bob, json!({"tag": "read", "key": "k"})).await;
    assert_eq!(recv_json(&mut bob).await["value"], Value::Null);
}

#[tokio::test]
async fn state_does_not_survive_reconnect() {
    let server = start_test_server(RouterConfig::default()).await;

    let mut first = connect(&server).await;
    send_json(&mut first, json!({"tag": "assign", "key": "k", "value": 1})).await;
    send_json(&mut first, json!({"tag": "read", "key": "k"})).await;
    assert_eq!(recv_json(&mut first).await["value"], 1);
    first.close(None).await.unwrap();

    let mut second = connect(&server).await;
    send_json(&mut second, json!({"tag": "read", "key": "k"})).await;
    assert_eq!(recv_json(&mut second).await["value"], Value::Null);
}

#[tokio::test]
async fn health_reports_connected_clients() {
    let server = start_test_server(RouterConfig::default()).await;
    let mut ws = connect(&server).await;
    // Make sure the connection is being served before asking.
    send_json(&mut ws, json!({"tag": "read", "key": "k"})).await;
    recv_json(&mut ws).await;

    let url = format!("http://127.0.0.1:{}/health", server.port());
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["clients"], 1);
}

#[tokio::test]
async fn health_client_count_drops_after_disconnect() {
    let server = start_test_server(RouterConfig::default()).await;
    let url = format!("http://127.0.0.1:{}/health", server.port());

    let mut ws = connect(&server).await;
    send_json(&mut ws, json!({"tag": "read", "key": "k"})).await;
    recv_json(&mut ws).await;
    ws.close(None).await.unwrap();

    let clients = timeout(Duration::from_secs(5), async {
        loop {
            let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
            if body["clients"] == 0 {
                return body["clients"].clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("clients never dropped back to 0");
    assert_eq!(clients, 0);
}
