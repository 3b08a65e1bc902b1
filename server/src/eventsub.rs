//! Push-based stream-status client (spec §4.9).
//!
//! Drives a [`PushProvider`](crate::collaborators::PushProvider)
//! collaborator: subscribes every monitored channel, forwards incoming
//! notifications to `system.event`, retries cost-exceeded subscriptions
//! with capped exponential backoff, and re-establishes the connection on
//! a liveness-check failure with its own backoff and attempt cap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::bus::{Bus, BusMessage, TOPIC_SYSTEM_EVENT};
use crate::collaborators::{PushEventKind, PushNotification, PushProvider};
use crate::core::constants::{
    EVENTSUB_LIVENESS_CHECK_SECS, EVENTSUB_RECONNECT_BASE_SECS, EVENTSUB_RECONNECT_MAX_ATTEMPTS,
    EVENTSUB_SUBSCRIBE_MAX_ATTEMPTS, EVENTSUB_SUBSCRIBE_RETRY_BASE_SECS, EVENTSUB_SUBSCRIBE_RETRY_CAP_SECS,
};
use crate::types::{EventKind, SystemEvent};

/// Maps broadcaster ids back to the channel name carried in published
/// events, since a push notification may not itself name the channel.
pub struct EventSubClient {
    channel_ids: HashMap<String, String>,
    provider: Arc<dyn PushProvider>,
    bus: Arc<Bus>,
}

impl EventSubClient {
    pub fn new(channel_ids: HashMap<String, String>, provider: Arc<dyn PushProvider>, bus: Arc<Bus>) -> Self {
        Self { channel_ids, provider, bus }
    }

    /// Resolves a notification's channel login from the hint carried on
    /// the notification itself, falling back to a reverse lookup in the
    /// broadcaster-id map. `None` means genuinely unresolvable, which the
    /// caller must drop rather than publish under a bogus channel name
    /// (spec §4.9 "if still unresolvable, drop the event with a warning").
    fn resolve_channel(&self, broadcaster_id: &str, hint: &Option<String>) -> Option<String> {
        hint.clone().or_else(|| self.channel_ids.get(broadcaster_id).cloned())
    }

    /// Subscribes every configured channel to both stream kinds, retrying
    /// cost-exceeded rejections with capped exponential backoff up to
    /// `EVENTSUB_SUBSCRIBE_MAX_ATTEMPTS` times before giving up quietly on
    /// that one subscription (spec §4.9 "Subscription retry").
    pub async fn subscribe_all(&self) {
        for broadcaster_id in self.channel_ids.keys() {
            for kind in [PushEventKind::StreamOnline, PushEventKind::StreamOffline] {
                self.subscribe_with_retry(broadcaster_id, kind).await;
            }
        }
    }

    async fn subscribe_with_retry(&self, broadcaster_id: &str, kind: PushEventKind) {
        let mut attempt: u32 = 0;
        let mut delay = EVENTSUB_SUBSCRIBE_RETRY_BASE_SECS;
        loop {
            match self.provider.subscribe(broadcaster_id, kind).await {
                Ok(()) => return,
                Err(crate::collaborators::PushSubscribeError::CostExceeded) => {
                    attempt += 1;
                    if attempt >= EVENTSUB_SUBSCRIBE_MAX_ATTEMPTS {
                        tracing::warn!(broadcaster_id, ?kind, attempt, "giving up on eventsub subscription: cost exceeded");
                        return;
                    }
                    tracing::debug!(broadcaster_id, ?kind, attempt, delay_secs = delay, "eventsub subscription cost exceeded, retrying");
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    delay = (delay * 2).min(EVENTSUB_SUBSCRIBE_RETRY_CAP_SECS);
                }
                Err(e) => {
                    tracing::warn!(broadcaster_id, ?kind, error = %e, "eventsub subscription failed");
                    return;
                }
            }
        }
    }

    async fn forward(&self, notification: PushNotification) {
        let channel = match self.resolve_channel(&notification.broadcaster_id, &notification.channel) {
            Some(c) => c,
            None => {
                let kind = notification.kind;
                tracing::warn!(
                    broadcaster_id = %notification.broadcaster_id,
                    kind = ?kind,
                    "dropping eventsub notification: channel unresolvable"
                );
                return;
            }
        };
        let mut payload = HashMap::new();
        payload.insert("channel".to_string(), serde_json::json!(channel));
        payload.insert("channel_id".to_string(), serde_json::json!(notification.broadcaster_id));
        payload.insert("source".to_string(), serde_json::json!("push"));
        if let Some(title) = &notification.title {
            payload.insert("title".to_string(), serde_json::json!(title));
        }
        if let Some(game_name) = &notification.game_name {
            payload.insert("game_name".to_string(), serde_json::json!(game_name));
        }
        if let Some(viewer_count) = notification.viewer_count {
            payload.insert("viewer_count".to_string(), serde_json::json!(viewer_count));
        }
        if let Some(started_at) = notification.started_at {
            payload.insert("started_at".to_string(), serde_json::json!(started_at));
        }

        let kind = match notification.kind {
            PushEventKind::StreamOnline => {
                tracing::info!(channel = %channel, source = "push", "stream went online");
                EventKind::StreamOnline
            }
            PushEventKind::StreamOffline => {
                tracing::debug!(channel = %channel, source = "push", "stream went offline");
                EventKind::StreamOffline
            }
        };
        let event = SystemEvent::new(kind, payload);
        self.bus.publish(TOPIC_SYSTEM_EVENT, BusMessage::Event(event)).await;
    }

    /// Connects, subscribes every channel, then supervises the connection:
    /// a liveness check every `EVENTSUB_LIVENESS_CHECK_SECS` triggers a
    /// full reconnect-and-resubscribe with exponential backoff, capped at
    /// `EVENTSUB_RECONNECT_MAX_ATTEMPTS` attempts (spec §4.9 "Liveness and
    /// reconnect").
    pub fn start(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reconnect_attempt: u32 = 0;

            loop {
                let (tx, mut rx) = mpsc::unbounded_channel();
                match self.provider.connect(tx).await {
                    Ok(()) => {
                        reconnect_attempt = 0;
                        self.subscribe_all().await;
                    }
                    Err(e) => {
                        reconnect_attempt += 1;
                        if reconnect_attempt > EVENTSUB_RECONNECT_MAX_ATTEMPTS {
                            tracing::error!(error = %e, attempts = reconnect_attempt, "eventsub permanently failed to connect");
                            return;
                        }
                        let delay = EVENTSUB_RECONNECT_BASE_SECS * 2u64.pow(reconnect_attempt - 1);
                        tracing::warn!(error = %e, attempt = reconnect_attempt, delay_secs = delay, "eventsub connect failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(delay)) => continue,
                            _ = shutdown_rx.changed() => { if *shutdown_rx.borrow() { return; } }
                        }
                        continue;
                    }
                }

                let mut liveness = tokio::time::interval(Duration::from_secs(EVENTSUB_LIVENESS_CHECK_SECS));
                liveness.tick().await;

                'session: loop {
                    tokio::select! {
                        Some(notification) = rx.recv() => {
                            self.forward(notification).await;
                        }
                        _ = liveness.tick() => {
                            if !self.provider.is_alive().await {
                                tracing::warn!("eventsub liveness check failed, reconnecting");
                                self.provider.disconnect().await;
                                break 'session;
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                self.provider.disconnect().await;
                                tracing::debug!("eventsub client stopped");
                                return;
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::PushError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingProvider {
        subscribe_calls: AtomicU64,
        fail_connect: bool,
    }

    #[async_trait]
    impl PushProvider for CountingProvider {
        async fn connect(&self, _tx: mpsc::UnboundedSender<PushNotification>) -> Result<(), PushError> {
            if self.fail_connect {
                Err(PushError::ConnectFailed("no".into()))
            } else {
                Ok(())
            }
        }

        async fn subscribe(&self, _broadcaster_id: &str, _kind: PushEventKind) -> Result<(), crate::collaborators::PushSubscribeError> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn is_alive(&self) -> bool {
            true
        }

        async fn disconnect(&self) {}
    }

    #[tokio::test]
    async fn subscribe_all_covers_both_kinds_per_channel() {
        let mut ids = HashMap::new();
        ids.insert("1001".to_string(), "chan".to_string());
        let provider = Arc::new(CountingProvider { subscribe_calls: AtomicU64::new(0), fail_connect: false });
        let client = EventSubClient::new(ids, provider.clone(), Arc::new(Bus::new()));
        client.subscribe_all().await;
        assert_eq!(provider.subscribe_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn forward_resolves_channel_from_map_when_hint_absent() {
        let mut ids = HashMap::new();
        ids.insert("1001".to_string(), "chan".to_string());
        let bus = Arc::new(Bus::new());
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_SYSTEM_EVENT, "test", move |msg| {
            let c = c.clone();
            async move {
                if let BusMessage::Event(e) = msg {
                    if e.payload_str("channel") == Some("chan") {
                        c.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Ok(())
            }
        })
        .await;

        let provider = Arc::new(CountingProvider { subscribe_calls: AtomicU64::new(0), fail_connect: false });
        let client = EventSubClient::new(ids, provider, bus.clone());
        client
            .forward(PushNotification {
                kind: PushEventKind::StreamOnline,
                broadcaster_id: "1001".to_string(),
                channel: None,
                title: None,
                game_name: None,
                viewer_count: None,
                started_at: None,
            })
            .await;
        bus.wait_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forward_drops_unresolvable_channel() {
        let ids = HashMap::new(); // broadcaster id not registered
        let bus = Arc::new(Bus::new());
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_SYSTEM_EVENT, "test", move |_msg| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        let provider = Arc::new(CountingProvider { subscribe_calls: AtomicU64::new(0), fail_connect: false });
        let client = EventSubClient::new(ids, provider, bus.clone());
        client
            .forward(PushNotification {
                kind: PushEventKind::StreamOnline,
                broadcaster_id: "9999".to_string(),
                channel: None,
                title: None,
                game_name: None,
                viewer_count: None,
                started_at: None,
            })
            .await;
        bus.wait_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
