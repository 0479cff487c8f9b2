//! WebSocket gateway
//!
//! Accepts connections, creates a `Client` for each one and translates the
//! JSON protocol into subscribe/cancel calls. Events are pushed back through
//! a per-connection channel so callbacks never wait on the socket.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::BrokerHandle;
use crate::client::{Client, Subscription};
use crate::transport::message::{ClientMessage, ServerMessage};

/// Serves the gateway on `addr` until the listener fails.
pub async fn start_websocket_server(addr: &str, broker: BrokerHandle) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("gateway listening on ws://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("gateway connection from {peer}");
        spawn(handle_connection(stream, broker.clone()));
    }
}

async fn handle_connection(stream: TcpStream, broker: BrokerHandle) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(broker);
    let client_id = client.id.clone();
    let mut subscriptions: HashMap<String, Subscription> = HashMap::new();

    let send_loop = {
        let client_id = client_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }
        })
    };

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Subscribe { topic, id }) => {
                if subscriptions.contains_key(&id) {
                    debug!("{client_id} reused subscription id {id}, ignoring");
                    continue;
                }
                let events = tx.clone();
                let sub_id = id.clone();
                let subscribed = client.subscribe(&topic, move |event| {
                    send_frame(&events, &ServerMessage::event(&sub_id, event));
                });
                match subscribed {
                    Ok(subscription) => {
                        info!("{client_id} subscribed to {topic} as {id}");
                        subscriptions.insert(id, subscription);
                    }
                    Err(e) => {
                        warn!("{client_id} could not subscribe to {topic}: {e}");
                        send_frame(
                            &tx,
                            &ServerMessage::Error {
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
            Ok(ClientMessage::Unsubscribe { id }) => {
                if let Some(subscription) = subscriptions.remove(&id) {
                    subscription.cancel();
                    info!("{client_id} unsubscribed {id} from {}", subscription.topic());
                }
            }
            Err(err) => {
                warn!(
                    "Invalid client message from {client_id}: {err} | {}",
                    &text.chars().take(100).collect::<String>()
                );
                send_frame(
                    &tx,
                    &ServerMessage::Error {
                        message: format!("invalid request: {err}"),
                    },
                );
            }
        }
    }

    info!(
        "{client_id} disconnected, cancelling {} subscriptions",
        subscriptions.len()
    );
    for (_, subscription) in subscriptions.drain() {
        subscription.cancel();
    }
    send_loop.abort();
}

fn send_frame(tx: &UnboundedSender<WsMessage>, frame: &ServerMessage) {
    match serde_json::to_string(frame) {
        Ok(json) => {
            let _ = tx.send(WsMessage::text(json));
        }
        Err(e) => warn!("Failed to serialize frame: {e}"),
    }
}
