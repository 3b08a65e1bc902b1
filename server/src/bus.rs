//! In-process publish/subscribe bus (spec §4.1) — the spine every
//! component communicates through. Grounded on the teacher's
//! `data::topics` module (`PubSubManager`/`PubSubBridge`: one entry per
//! topic, broadcast fan-out, reference-counted lifecycle), reshaped
//! around a closed 3-topic message enum instead of a generic byte-vec
//! broadcast channel, since spec §6 only ever carries `ChatMessage`,
//! `OutboundMessage`, or `SystemEvent`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::types::{ChatMessage, OutboundMessage, SystemEvent};

/// The three topics in spec §6, closed so a handler never has to guess
/// what shape a publish carries.
#[derive(Debug, Clone)]
pub enum BusMessage {
    Chat(ChatMessage),
    Outbound(OutboundMessage),
    Event(SystemEvent),
}

pub const TOPIC_CHAT_INBOUND: &str = "chat.inbound";
pub const TOPIC_CHAT_OUTBOUND: &str = "chat.outbound";
pub const TOPIC_SYSTEM_EVENT: &str = "system.event";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("handler '{handler}' on topic '{topic}' failed: {message}")]
    HandlerFailed {
        topic: String,
        handler: String,
        message: String,
    },
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type HandlerFn = Arc<dyn Fn(BusMessage) -> HandlerFuture + Send + Sync>;

/// A registered handler bound to a topic; owned by the bus until the
/// bus itself is torn down (spec §3 "Subscription").
#[derive(Clone)]
struct Subscriber {
    id: u64,
    name: String,
    handler: HandlerFn,
}

#[derive(Debug, Clone, Copy)]
pub struct BusStats {
    pub topic_count: usize,
    pub subscriber_count: usize,
    pub in_flight: usize,
}

/// Fire-and-forget pub/sub bus with per-subscriber isolated delivery.
///
/// `publish` spawns one supervised task per handler and returns without
/// waiting; a panicking or erroring handler is logged and never affects
/// its siblings (spec §4.1, §8 "Bus isolation").
pub struct Bus {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler on `topic`. Insertion order is preserved per
    /// topic; multiple handlers per topic are allowed.
    pub async fn subscribe<F, Fut>(&self, topic: &str, name: impl Into<String>, handler: F) -> u64
    where
        F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sub = Subscriber {
            id,
            name: name.into(),
            handler: Arc::new(move |msg| Box::pin(handler(msg))),
        };
        let mut subs = self.subscribers.write().await;
        subs.entry(topic.to_string()).or_default().push(sub);
        id
    }

    /// Remove a single subscriber by id, if present.
    pub async fn unsubscribe(&self, topic: &str, id: u64) {
        let mut subs = self.subscribers.write().await;
        if let Some(list) = subs.get_mut(topic) {
            list.retain(|s| s.id != id);
        }
    }

    /// Spawn one supervised task per handler currently registered on
    /// `topic`, passing a clone of `msg` to each. Never awaits handler
    /// completion.
    pub async fn publish(&self, topic: &str, msg: BusMessage) {
        let snapshot: Vec<Subscriber> = {
            let subs = self.subscribers.read().await;
            subs.get(topic).cloned().unwrap_or_default()
        };

        if snapshot.is_empty() {
            return;
        }

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());

        for sub in snapshot {
            let topic = topic.to_string();
            let handler = sub.handler.clone();
            let name = sub.name.clone();
            let payload = msg.clone();
            let handle = tokio::spawn(async move {
                if let Err(message) = handler(payload).await {
                    let err = BusError::HandlerFailed {
                        topic: topic.clone(),
                        handler: name.clone(),
                        message,
                    };
                    tracing::error!(topic = %topic, handler = %name, "{err}");
                }
            });
            handles.push(handle);
        }
    }

    /// Await every in-flight delivery. Used only at shutdown (spec §4.1,
    /// §5 "Cancellation").
    pub async fn wait_all(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            std::mem::take(&mut *guard)
        };
        futures::future::join_all(handles).await;
    }

    pub async fn stats(&self) -> BusStats {
        let subs = self.subscribers.read().await;
        let topic_count = subs.len();
        let subscriber_count = subs.values().map(|v| v.len()).sum();
        drop(subs);

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        let in_flight = handles.len();

        BusStats {
            topic_count,
            subscriber_count,
            in_flight,
        }
    }
}
