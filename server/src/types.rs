//! Core data model shared by every component (spec §3).
//!
//! These three types are exactly the payloads carried by the bus's three
//! topics: `chat.inbound` (`ChatMessage`), `chat.outbound`
//! (`OutboundMessage`), `system.event` (`SystemEvent`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A chat line received from the transport, filtered to exclude the
/// bot's own user id by the transport before it ever reaches the bus.
/// Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: String,
    pub channel_id: String,
    pub user_login: String,
    pub user_id: String,
    pub text: String,
    pub is_moderator: bool,
    pub is_broadcaster: bool,
    pub is_vip: bool,
    pub badges: HashMap<String, String>,
    /// Which transport this line arrived on (e.g. "irc"); carried for
    /// parity with `OutboundMessage::transport_hint`, not interpreted here.
    pub transport: String,
}

/// A reply destined for the chat transport. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub channel_id: String,
    pub text: String,
    pub transport_hint: Option<String>,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, channel_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            channel_id: channel_id.into(),
            text: text.into(),
            transport_hint: None,
        }
    }
}

/// Closed set of `SystemEvent` kinds (spec §3, §6).
///
/// `Helix*` kinds are produced by the read-only REST collaborator purely
/// informationally; no core component subscribes to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StreamOnline,
    StreamOffline,
    HelixStreamInfo,
    HelixUserInfo,
    HelixGameInfo,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StreamOnline => "stream.online",
            EventKind::StreamOffline => "stream.offline",
            EventKind::HelixStreamInfo => "helix.stream.info",
            EventKind::HelixUserInfo => "helix.user.info",
            EventKind::HelixGameInfo => "helix.game.info",
        }
    }
}

/// A tagged record with an opaque payload mapping. Immutable after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub kind: EventKind,
    pub payload: HashMap<String, serde_json::Value>,
}

impl SystemEvent {
    pub fn new(kind: EventKind, payload: HashMap<String, serde_json::Value>) -> Self {
        Self { kind, payload }
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}
