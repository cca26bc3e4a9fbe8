//! WebSocket fan-out (spec §4.G "Fan-out", §6 "WebSocket"): clients
//! subscribe to a topic and receive every broadcast posted to it, in commit
//! order. The topic → socket-set map is guarded by one mutex (spec §5
//! "Shared resources").

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use super::state::AppState;

type SocketId = u64;

struct Registry {
    sockets: HashMap<SocketId, mpsc::UnboundedSender<Message>>,
    topics: HashMap<String, HashSet<SocketId>>,
}

pub struct TopicRegistry {
    next_id: AtomicU64,
    inner: Mutex<Registry>,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self { next_id: AtomicU64::new(1), inner: Mutex::new(Registry { sockets: HashMap::new(), topics: HashMap::new() }) }
    }
}

impl TopicRegistry {
    async fn register_async(&self, sender: mpsc::UnboundedSender<Message>) -> SocketId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        inner.sockets.insert(id, sender);
        id
    }

    async fn subscribe(&self, id: SocketId, topic: &str) {
        let mut inner = self.inner.lock().await;
        inner.topics.entry(topic.to_string()).or_default().insert(id);
    }

    async fn unsubscribe(&self, id: SocketId, topic: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(set) = inner.topics.get_mut(topic) {
            set.remove(&id);
        }
    }

    async fn remove(&self, id: SocketId) {
        let mut inner = self.inner.lock().await;
        inner.sockets.remove(&id);
        for set in inner.topics.values_mut() {
            set.remove(&id);
        }
    }

    /// Pushes `payload` to every socket subscribed to `topic`, in the order
    /// this call is made (spec §5 "total order of broadcasts matching the
    /// Store's commit order").
    pub async fn publish(&self, topic: &str, payload: Value) {
        let inner = self.inner.lock().await;
        let Some(ids) = inner.topics.get(topic) else { return };
        let text = payload.to_string();
        for id in ids {
            if let Some(sender) = inner.sockets.get(id) {
                let _ = sender.send(Message::Text(text.clone()));
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe {
        topic: Option<String>,
        #[serde(rename = "chatId")]
        chat_id: Option<String>,
        #[allow(dead_code)]
        uid: Option<String>,
    },
    Unsubscribe {
        topic: Option<String>,
        #[serde(rename = "chatId")]
        chat_id: Option<String>,
        #[allow(dead_code)]
        uid: Option<String>,
    },
    Ping,
}

fn resolve_topic(topic: Option<String>, chat_id: Option<String>) -> Option<String> {
    topic.or_else(|| chat_id.map(|id| format!("chat:{id}")))
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = state.topics.register_async(tx.clone()).await;

    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut ping_interval = tokio::time::interval(Duration::from_secs(30));
    ping_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong {
                    tracing::debug!(socket_id = id, "no pong within keepalive window, closing socket");
                    break;
                }
                awaiting_pong = true;
                if tx.send(Message::Ping(Vec::new())).is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Pong(_) => awaiting_pong = false,
                    Message::Close(_) => break,
                    Message::Text(text) => handle_client_frame(&state, id, &tx, &text).await,
                    _ => {}
                }
            }
        }
    }

    state.topics.remove(id).await;
    forward.abort();
}

async fn handle_client_frame(state: &Arc<AppState>, id: SocketId, tx: &mpsc::UnboundedSender<Message>, text: &str) {
    let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
        return;
    };
    match frame {
        ClientFrame::Subscribe { topic, chat_id, .. } => {
            let Some(topic) = resolve_topic(topic, chat_id.clone()) else { return };
            state.topics.subscribe(id, &topic).await;
            let ack = if let Some(chat_id) = chat_id {
                json!({ "type": "subscribed", "chatId": chat_id })
            } else {
                json!({ "type": "subscribed", "topic": topic })
            };
            let _ = tx.send(Message::Text(ack.to_string()));
        }
        ClientFrame::Unsubscribe { topic, chat_id, .. } => {
            if let Some(topic) = resolve_topic(topic, chat_id) {
                state.topics.unsubscribe(id, &topic).await;
            }
        }
        ClientFrame::Ping => {
            let _ = tx.send(Message::Text(json!({ "type": "pong" }).to_string()));
        }
    }
}
