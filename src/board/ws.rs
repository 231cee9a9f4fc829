//! WebSocket push of document changes.
//!
//! Every successful document write is published once on a broadcast channel.
//! A socket may narrow its feed to one document with
//! `/ws?collection=kanban&document=allItems`; without a query it sees every
//! write.

use std::time::{Duration, Instant};

use axum::{
    extract::{
        Query,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::store::DocumentKey;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// A document was written. Carries the full stored body.
    DocumentChanged {
        collection: String,
        document: String,
        body: serde_json::Value,
    },
}

impl WsMessage {
    pub fn changed(key: &DocumentKey, body: serde_json::Value) -> Self {
        WsMessage::DocumentChanged {
            collection: key.collection.clone(),
            document: key.document.clone(),
            body,
        }
    }

    pub fn concerns(&self, key: &DocumentKey) -> bool {
        match self {
            WsMessage::DocumentChanged {
                collection,
                document,
                ..
            } => *collection == key.collection && *document == key.document,
        }
    }
}

/// Optional document filter given on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WatchQuery {
    pub collection: Option<String>,
    pub document: Option<String>,
}

impl WatchQuery {
    /// Both halves are needed to narrow the feed; anything less watches all.
    pub fn key(&self) -> Option<DocumentKey> {
        match (&self.collection, &self.document) {
            (Some(c), Some(d)) if !c.is_empty() && !d.is_empty() => Some(DocumentKey::new(c, d)),
            _ => None,
        }
    }
}

/// Tracks ping/pong liveness for one socket.
#[derive(Debug)]
struct Keepalive {
    last_pong: Instant,
    awaiting_pong: bool,
}

impl Keepalive {
    fn new(now: Instant) -> Self {
        Self {
            last_pong: now,
            awaiting_pong: false,
        }
    }

    /// Called on every ping tick. `false` means the peer is gone.
    fn tick(&mut self, now: Instant) -> bool {
        if self.awaiting_pong && now.duration_since(self.last_pong) > PONG_TIMEOUT {
            return false;
        }
        self.awaiting_pong = true;
        true
    }

    fn pong(&mut self, now: Instant) {
        self.last_pong = now;
        self.awaiting_pong = false;
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(watch): Query<WatchQuery>,
    tx: broadcast::Sender<WsMessage>,
) -> impl IntoResponse {
    let filter = watch.key();
    ws.on_upgrade(move |socket| serve_socket(socket, tx.subscribe(), filter))
}

async fn serve_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<WsMessage>,
    filter: Option<DocumentKey>,
) {
    let (mut sender, mut receiver) = socket.split();
    debug!(filter = ?filter.as_ref().map(|k| k.to_string()), "websocket client connected");

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;
    let mut keepalive = Keepalive::new(Instant::now());

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if !keepalive.tick(Instant::now()) {
                    debug!("websocket pong timeout");
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }

            update = rx.recv() => {
                let msg = match update {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "websocket client lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if filter.as_ref().is_some_and(|key| !msg.concerns(key)) {
                    continue;
                }
                let Some(text) = encode(&msg) else { continue };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Pong(_))) => keepalive.pong(Instant::now()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    debug!("websocket client disconnected");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg)
        .map_err(|e| warn!(error = %e, "failed to serialize websocket message"))
        .ok()
}

/// Publish to every connected socket. Returns how many sockets were listening.
pub fn broadcast_message(tx: &broadcast::Sender<WsMessage>, msg: WsMessage) -> usize {
    tx.send(msg).unwrap_or(0)
}
