use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::broker::{Broker, BrokerConfig, BrokerHandle};
use crate::transport::websocket::start_websocket_server;
use crate::upstream::mock::MockEndpoint;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn setup_server() -> (String, BrokerHandle, Arc<MockEndpoint>) {
    let endpoint = MockEndpoint::new();
    let broker = Broker::spawn(endpoint.clone(), BrokerConfig::default());
    let addr = format!(
        "127.0.0.1:{}",
        portpicker::pick_unused_port().expect("No free ports")
    );

    let server_addr = addr.clone();
    let server_broker = broker.clone();
    tokio::spawn(async move {
        if let Err(e) = start_websocket_server(&server_addr, server_broker).await {
            panic!("gateway failed: {e}");
        }
    });

    // Give the server a moment to start up
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, broker, endpoint)
}

async fn connect(addr: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("WebSocket handshake failed");
    ws
}

async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("Failed to send message");
}

async fn recv_frame(ws: &mut WsClient) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timed out waiting for a frame")
        .expect("Connection closed")
        .unwrap();
    let raw_data = msg.into_data();
    serde_json::from_slice(&raw_data).unwrap_or_else(|e| {
        panic!("Failed to parse frame '{raw_data:?}': {e}");
    })
}

/// Returns the subscription id and kind of an event frame.
fn expect_event(frame: &Value) -> (&str, &str) {
    assert_eq!(frame["type"], "event", "Expected Event, got {frame}");
    (
        frame["id"].as_str().unwrap(),
        frame["kind"].as_str().unwrap(),
    )
}

#[tokio::test]
async fn test_tabs_share_one_upstream_connection() {
    let (addr, broker, endpoint) = setup_server().await;
    let mut tab_a = connect(&addr).await;
    let mut tab_b = connect(&addr).await;

    send_json(&mut tab_a, json!({"type": "subscribe", "topic": "issue:42", "id": "a1"})).await;
    let frame = recv_frame(&mut tab_a).await;
    assert_eq!(expect_event(&frame), ("a1", "open"));

    send_json(&mut tab_b, json!({"type": "subscribe", "topic": "issue:42", "id": "b1"})).await;
    let frame = recv_frame(&mut tab_b).await;
    assert_eq!(expect_event(&frame), ("b1", "open"));
    assert_eq!(endpoint.connects("issue:42"), 1);

    send_json(&mut tab_a, json!({"type": "unsubscribe", "id": "a1"})).await;
    // Wait for the gateway to pass the unsubscribe on.
    for _ in 0..100 {
        if broker.topics().await.unwrap()[0].subscribers == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(broker.topics().await.unwrap()[0].subscribers, 1);

    endpoint.push("issue:42", r#"{"issue_id":"42"}"#);
    let frame = recv_frame(&mut tab_b).await;
    assert_eq!(expect_event(&frame), ("b1", "message"));
    assert_eq!(frame["data"], json!({"issue_id": "42"}));
    assert!(frame.get("raw").is_none());

    let nothing = tokio::time::timeout(Duration::from_millis(100), tab_a.next()).await;
    assert!(nothing.is_err(), "unsubscribed tab received {nothing:?}");
}

#[tokio::test]
async fn test_invalid_request_gets_error_frame() {
    let (addr, _broker, _endpoint) = setup_server().await;
    let mut tab = connect(&addr).await;

    tab.send(WsMessage::Text("not json".to_string().into()))
        .await
        .unwrap();

    let frame = recv_frame(&mut tab).await;
    assert_eq!(frame["type"], "error");
    assert!(
        frame["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid request")
    );
}

#[tokio::test]
async fn test_duplicate_subscription_id_is_ignored() {
    let (addr, broker, _endpoint) = setup_server().await;
    let mut tab = connect(&addr).await;

    send_json(&mut tab, json!({"type": "subscribe", "topic": "t", "id": "x"})).await;
    recv_frame(&mut tab).await;

    send_json(&mut tab, json!({"type": "subscribe", "topic": "other", "id": "x"})).await;
    send_json(&mut tab, json!({"type": "subscribe", "topic": "t", "id": "y"})).await;
    let frame = recv_frame(&mut tab).await;
    assert_eq!(expect_event(&frame), ("y", "open"));

    let topics = broker.topics().await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].subscribers, 2);
}

#[tokio::test]
async fn test_disconnect_cancels_subscriptions() {
    let (addr, broker, endpoint) = setup_server().await;
    let mut tab = connect(&addr).await;

    send_json(&mut tab, json!({"type": "subscribe", "topic": "t", "id": "x"})).await;
    recv_frame(&mut tab).await;

    tab.close(None).await.unwrap();
    drop(tab);

    let mut subscribers = usize::MAX;
    for _ in 0..100 {
        subscribers = broker.topics().await.unwrap()[0].subscribers;
        if subscribers == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(subscribers, 0);
    // The connection itself waits for the reaper.
    assert!(endpoint.is_streaming("t"));
}

#[tokio::test]
async fn test_upstream_error_reaches_tab() {
    let (addr, _broker, endpoint) = setup_server().await;
    let mut tab = connect(&addr).await;

    send_json(&mut tab, json!({"type": "subscribe", "topic": "t", "id": "x"})).await;
    recv_frame(&mut tab).await;

    endpoint.hang_up("t");
    let frame = recv_frame(&mut tab).await;
    assert_eq!(expect_event(&frame), ("x", "error"));
    assert_eq!(frame["data"], "stream closed by remote");
    assert_eq!(frame["raw"], true);
}

#[tokio::test]
async fn test_raw_and_json_string_payloads_are_distinguishable() {
    let (addr, _broker, endpoint) = setup_server().await;
    let mut tab = connect(&addr).await;

    send_json(&mut tab, json!({"type": "subscribe", "topic": "t", "id": "x"})).await;
    recv_frame(&mut tab).await;

    endpoint.push("t", "oops{");
    endpoint.push("t", r#""oops{""#);

    let raw = recv_frame(&mut tab).await;
    assert_eq!(raw["data"], "oops{");
    assert_eq!(raw["raw"], true);

    let decoded = recv_frame(&mut tab).await;
    assert_eq!(decoded["data"], "oops{");
    assert!(decoded.get("raw").is_none());
}
