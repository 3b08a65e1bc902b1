//! Polling stream-status monitor (spec §4.8).
//!
//! Grounded on the teacher's `TracePipeline::start(self, ..., shutdown_rx)
//! -> JoinHandle<()>` background-loop shape, reading each channel's live
//! status off the [`RestClient`](crate::collaborators::RestClient)
//! collaborator on a fixed interval and publishing transitions onto
//! `system.event`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::bus::{Bus, BusMessage, TOPIC_SYSTEM_EVENT};
use crate::collaborators::RestClient;
use crate::types::{EventKind, SystemEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelStatus {
    Unknown,
    Online,
    Offline,
}

impl ChannelStatus {
    fn as_str(self) -> &'static str {
        match self {
            ChannelStatus::Unknown => "unknown",
            ChannelStatus::Online => "online",
            ChannelStatus::Offline => "offline",
        }
    }
}

/// Per-channel poll state: current status plus the last stream snapshot's
/// channel id, kept around so an offline event (which carries no fresh
/// snapshot) can still report `channel_id` (spec §3 "ChannelStatus ...
/// last stream snapshot").
#[derive(Debug, Clone, Default)]
struct ChannelState {
    status: Option<ChannelStatus>,
    last_channel_id: Option<String>,
}

/// Polls every monitored channel's stream status once per
/// `polling_interval_secs` and publishes `stream.online`/`stream.offline`
/// transitions (spec §4.8 "Polling loop"). Silent on unknown->X and X->X;
/// only genuine transitions are published.
pub struct StreamMonitor {
    channels: Vec<String>,
    polling_interval_secs: u64,
    rest: Arc<dyn RestClient>,
    bus: Arc<Bus>,
    state: Mutex<HashMap<String, ChannelState>>,
}

impl StreamMonitor {
    pub fn new(channels: Vec<String>, polling_interval_secs: u64, rest: Arc<dyn RestClient>, bus: Arc<Bus>) -> Self {
        let state = channels.iter().map(|c| (c.clone(), ChannelState::default())).collect();
        Self {
            channels,
            polling_interval_secs,
            rest,
            bus,
            state: Mutex::new(state),
        }
    }

    /// One polling pass over every monitored channel (exposed for tests;
    /// `start` calls this on an interval).
    pub async fn poll_once(&self) {
        for channel in &self.channels {
            let snapshot = self.rest.get_stream(channel).await;
            let observed = if snapshot.is_some() {
                ChannelStatus::Online
            } else {
                ChannelStatus::Offline
            };

            let (previous, last_channel_id) = {
                let mut state = self.state.lock().await;
                let entry = state.entry(channel.clone()).or_default();
                let previous = entry.status.unwrap_or(ChannelStatus::Unknown);
                entry.status = Some(observed);
                if let Some(s) = &snapshot {
                    entry.last_channel_id = Some(s.channel_id.clone());
                }
                (previous, entry.last_channel_id.clone())
            };

            match (previous, observed) {
                (ChannelStatus::Unknown, _) => {
                    // First observation ever: seed state silently (spec
                    // §4.8 "unknown -> X is silent").
                }
                (ChannelStatus::Offline, ChannelStatus::Online) => {
                    self.publish_online(channel, previous, snapshot).await;
                }
                (ChannelStatus::Online, ChannelStatus::Offline) => {
                    tracing::debug!(channel = %channel, "poll observed stream went offline");
                    self.publish_offline(channel, previous, last_channel_id).await;
                }
                _ => {}
            }
        }
    }

    async fn publish_online(&self, channel: &str, previous: ChannelStatus, snapshot: Option<crate::collaborators::StreamSnapshot>) {
        tracing::info!(channel = %channel, source = "poll", "stream went online");
        let mut payload = std::collections::HashMap::new();
        payload.insert("channel".to_string(), serde_json::json!(channel));
        payload.insert("source".to_string(), serde_json::json!("poll"));
        payload.insert(
            "transition".to_string(),
            serde_json::json!(format!("{} → {}", previous.as_str(), ChannelStatus::Online.as_str())),
        );
        if let Some(s) = snapshot {
            payload.insert("channel_id".to_string(), serde_json::json!(s.channel_id));
            payload.insert("title".to_string(), serde_json::json!(s.title));
            payload.insert("game_name".to_string(), serde_json::json!(s.game_name));
            payload.insert("viewer_count".to_string(), serde_json::json!(s.viewer_count));
            payload.insert("started_at".to_string(), serde_json::json!(s.started_at));
        }
        let event = SystemEvent::new(EventKind::StreamOnline, payload);
        self.bus.publish(TOPIC_SYSTEM_EVENT, BusMessage::Event(event)).await;
    }

    async fn publish_offline(&self, channel: &str, previous: ChannelStatus, last_channel_id: Option<String>) {
        let mut payload = std::collections::HashMap::new();
        payload.insert("channel".to_string(), serde_json::json!(channel));
        payload.insert("source".to_string(), serde_json::json!("poll"));
        payload.insert(
            "transition".to_string(),
            serde_json::json!(format!("{} → {}", previous.as_str(), ChannelStatus::Offline.as_str())),
        );
        if let Some(channel_id) = last_channel_id {
            payload.insert("channel_id".to_string(), serde_json::json!(channel_id));
        }
        let event = SystemEvent::new(EventKind::StreamOffline, payload);
        self.bus.publish(TOPIC_SYSTEM_EVENT, BusMessage::Event(event)).await;
    }

    /// Runs the polling loop until `shutdown_rx` fires.
    pub fn start(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.polling_interval_secs));
            interval.tick().await; // first tick fires immediately; consume it before the loop's own immediate poll
            loop {
                self.poll_once().await;
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("stream monitor poll loop stopped");
        })
    }
}
