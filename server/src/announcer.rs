//! Turns `system.event` stream transitions into chat announcements (spec
//! §4.11).

use std::sync::Arc;

use crate::bus::{Bus, BusMessage, TOPIC_CHAT_OUTBOUND, TOPIC_SYSTEM_EVENT};
use crate::core::config::AnnounceTemplate;
use crate::core::constants::{ANNOUNCE_MAX_CHARS, DEFAULT_ANNOUNCE_GAME, DEFAULT_ANNOUNCE_TITLE, FALLBACK_ONLINE_MESSAGE};
use crate::types::{EventKind, OutboundMessage, SystemEvent};
use crate::utils::string::truncate_preview;

/// Renders `{channel}`, `{title}`, `{game_name}`, `{viewer_count}`
/// placeholders in `template` (spec §4.11 "Template rendering"), filling
/// absent fields with the documented defaults.
fn render_template(template: &str, event: &SystemEvent) -> String {
    let channel = event.payload_str("channel").unwrap_or("the channel");
    let title = event.payload_str("title").unwrap_or(DEFAULT_ANNOUNCE_TITLE);
    let game_name = event.payload_str("game_name").unwrap_or(DEFAULT_ANNOUNCE_GAME);
    let viewer_count = event
        .payload
        .get("viewer_count")
        .and_then(|v| v.as_u64())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());

    template
        .replace("{channel}", channel)
        .replace("{title}", title)
        .replace("{game_name}", game_name)
        .replace("{viewer_count}", &viewer_count)
}

/// Subscribes to `system.event`, formats the matching template for
/// `stream.online`/`stream.offline`, and publishes the result on
/// `chat.outbound`. Installed once at startup; runs for the lifetime of
/// the bus.
pub struct Announcer {
    stream_online: AnnounceTemplate,
    stream_offline: AnnounceTemplate,
    bus: Arc<Bus>,
}

impl Announcer {
    pub fn new(stream_online: AnnounceTemplate, stream_offline: AnnounceTemplate, bus: Arc<Bus>) -> Self {
        Self { stream_online, stream_offline, bus }
    }

    /// `None` means "this kind of announcement is disabled"; distinct
    /// from a render failure, which falls back to a minimal message
    /// instead of being silently dropped (spec §4.11, §7 "Stream
    /// announcements that fail template formatting").
    fn enabled_template(&self, kind: EventKind) -> Option<&str> {
        match kind {
            EventKind::StreamOnline if self.stream_online.enabled => Some(&self.stream_online.message),
            EventKind::StreamOffline if self.stream_offline.enabled => Some(&self.stream_offline.message),
            _ => None,
        }
    }

    fn format(&self, event: &SystemEvent) -> Option<String> {
        let template = self.enabled_template(event.kind)?;
        let rendered = render_template(template, event);
        Some(truncate_preview(&rendered, ANNOUNCE_MAX_CHARS))
    }

    async fn handle(&self, event: SystemEvent) {
        let channel = event.payload_str("channel").unwrap_or("").to_string();
        if channel.is_empty() {
            return;
        }

        if self.enabled_template(event.kind).is_none() {
            return;
        }

        let text = self.format(&event).unwrap_or_else(|| {
            tracing::warn!(channel = %channel, "announcement template failed to render, using fallback");
            FALLBACK_ONLINE_MESSAGE.to_string()
        });

        let outbound = OutboundMessage::new(channel.clone(), channel, text);
        self.bus.publish(TOPIC_CHAT_OUTBOUND, BusMessage::Outbound(outbound)).await;
    }

    /// Installs this announcer's subscription on `bus` (spec §4.11
    /// "Activation"). Delivery itself runs through the bus's own
    /// supervised per-handler tasks, matching `Bus::publish`'s
    /// fire-and-forget contract.
    pub async fn install(self: Arc<Self>) {
        let announcer = self.clone();
        self.bus
            .subscribe(TOPIC_SYSTEM_EVENT, "announcer", move |msg| {
                let announcer = announcer.clone();
                async move {
                    if let BusMessage::Event(event) = msg {
                        if matches!(event.kind, EventKind::StreamOnline | EventKind::StreamOffline) {
                            announcer.handle(event).await;
                        }
                    }
                    Ok(())
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn online_event(channel: &str, title: &str, game: &str, viewers: u64) -> SystemEvent {
        let mut payload = HashMap::new();
        payload.insert("channel".to_string(), serde_json::json!(channel));
        payload.insert("title".to_string(), serde_json::json!(title));
        payload.insert("game_name".to_string(), serde_json::json!(game));
        payload.insert("viewer_count".to_string(), serde_json::json!(viewers));
        SystemEvent::new(EventKind::StreamOnline, payload)
    }

    fn default_templates() -> (AnnounceTemplate, AnnounceTemplate) {
        (
            AnnounceTemplate { enabled: true, message: "{channel} live: {title} ({game_name}) {viewer_count}v".to_string() },
            AnnounceTemplate { enabled: true, message: "{channel} offline".to_string() },
        )
    }

    #[test]
    fn renders_all_placeholders() {
        let (online, offline) = default_templates();
        let announcer = Announcer::new(online, offline, Arc::new(Bus::new()));
        let event = online_event("chan", "Cool stream", "Rust", 42);
        assert_eq!(announcer.format(&event), Some("chan live: Cool stream (Rust) 42v".to_string()));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let (online, offline) = default_templates();
        let announcer = Announcer::new(online, offline, Arc::new(Bus::new()));
        let mut payload = HashMap::new();
        payload.insert("channel".to_string(), serde_json::json!("chan"));
        let event = SystemEvent::new(EventKind::StreamOnline, payload);
        let rendered = announcer.format(&event).unwrap();
        assert!(rendered.contains(DEFAULT_ANNOUNCE_TITLE));
        assert!(rendered.contains(DEFAULT_ANNOUNCE_GAME));
    }

    #[test]
    fn disabled_template_yields_no_announcement() {
        let (mut online, offline) = default_templates();
        online.enabled = false;
        let announcer = Announcer::new(online, offline, Arc::new(Bus::new()));
        let event = online_event("chan", "t", "g", 1);
        assert_eq!(announcer.format(&event), None);
    }

    #[tokio::test]
    async fn disabled_template_publishes_nothing_not_even_the_fallback() {
        let bus = Arc::new(Bus::new());
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let (mut online, offline) = default_templates();
        online.enabled = false;
        let announcer = Arc::new(Announcer::new(online, offline, bus.clone()));
        announcer.install().await;

        let event = online_event("chan", "t", "g", 1);
        bus.publish(TOPIC_SYSTEM_EVENT, BusMessage::Event(event)).await;
        bus.wait_all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn install_publishes_to_chat_outbound() {
        let bus = Arc::new(Bus::new());
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let (online, offline) = default_templates();
        let announcer = Arc::new(Announcer::new(online, offline, bus.clone()));
        announcer.install().await;

        let event = online_event("chan", "t", "g", 1);
        bus.publish(TOPIC_SYSTEM_EVENT, BusMessage::Event(event)).await;
        bus.wait_all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
