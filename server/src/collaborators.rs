//! External collaborator interfaces (spec §6).
//!
//! The chat transport, the read-only REST client, and the push-subscription
//! provider are explicitly out of scope for this core (spec §1): this
//! module only fixes the trait surface the core depends on, so the three
//! in-scope subsystems (`StreamMonitor`, `EventSubClient`, `Announcer`)
//! can be built and tested against in-memory fakes without pulling in a
//! real Twitch client. A production deployment supplies real
//! implementations of these traits from outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A snapshot of a channel's live stream, as returned by the read-only
/// REST collaborator's `get_stream` (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    pub channel_id: String,
    pub title: String,
    pub game_name: String,
    pub viewer_count: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub user_id: String,
    pub login: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameInfo {
    pub game_id: String,
    pub name: String,
}

/// Read-only REST collaborator (spec §6). Each call is bounded by
/// `apis.timeout` on the caller's side; this trait itself carries no
/// timeout so a fake can answer instantly in tests.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn get_stream(&self, channel: &str) -> Option<StreamSnapshot>;
    async fn get_user(&self, login: &str) -> Option<UserInfo>;
    async fn get_game(&self, name: &str) -> Option<GameInfo>;
}

/// A `RestClient` that never finds anything live. Used where no
/// production REST collaborator has been wired in; `StreamMonitor` then
/// always observes channels as offline, which is a safe default rather
/// than a silent failure.
pub struct NullRestClient;

#[async_trait]
impl RestClient for NullRestClient {
    async fn get_stream(&self, _channel: &str) -> Option<StreamSnapshot> {
        None
    }

    async fn get_user(&self, _login: &str) -> Option<UserInfo> {
        None
    }

    async fn get_game(&self, _name: &str) -> Option<GameInfo> {
        None
    }
}

/// The two notification kinds a push provider can deliver (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEventKind {
    StreamOnline,
    StreamOffline,
}

/// A single push notification from the provider. `channel` may be
/// missing; `EventSubClient` resolves it via the channel/broadcaster-id
/// map it owns (spec §4.9).
#[derive(Debug, Clone)]
pub struct PushNotification {
    pub kind: PushEventKind,
    pub broadcaster_id: String,
    pub channel: Option<String>,
    pub title: Option<String>,
    pub game_name: Option<String>,
    pub viewer_count: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PushSubscribeError {
    #[error("subscription cost/quota limit exceeded")]
    CostExceeded,
    #[error("push provider error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push provider failed to connect: {0}")]
    ConnectFailed(String),
    #[error("push provider session expired")]
    SessionExpired,
}

/// Push-subscription provider (spec §4.9, §6). The core requires only:
/// connect with a notification sink, subscribe-by-broadcaster-id,
/// liveness check, and graceful stop.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Opens the streaming subscription. Notifications are delivered
    /// through `tx` for the lifetime of the connection.
    async fn connect(&self, tx: tokio::sync::mpsc::UnboundedSender<PushNotification>) -> Result<(), PushError>;

    /// Subscribes to `kind` for `broadcaster_id`. May be rejected with
    /// `CostExceeded` if the provider's cost/quota limit is hit.
    async fn subscribe(&self, broadcaster_id: &str, kind: PushEventKind) -> Result<(), PushSubscribeError>;

    /// Whether the current connection is alive.
    async fn is_alive(&self) -> bool;

    /// Tears down the current connection and all subscriptions.
    async fn disconnect(&self);
}

/// A `PushProvider` that always fails to connect. `MonitorSupervisor`
/// then falls back to `StreamMonitor` polling in `auto` mode, which is
/// the safe default absent a real push integration.
pub struct NullPushProvider;

#[async_trait]
impl PushProvider for NullPushProvider {
    async fn connect(&self, _tx: tokio::sync::mpsc::UnboundedSender<PushNotification>) -> Result<(), PushError> {
        Err(PushError::ConnectFailed("no push provider configured".into()))
    }

    async fn subscribe(&self, _broadcaster_id: &str, _kind: PushEventKind) -> Result<(), PushSubscribeError> {
        Err(PushSubscribeError::Other("no push provider configured".into()))
    }

    async fn is_alive(&self) -> bool {
        false
    }

    async fn disconnect(&self) {}
}

/// Chat transport (spec §6). Not consumed directly by the core — the
/// transport subscribes to `chat.outbound` and publishes to
/// `chat.inbound` on its own, via the `Bus` passed to it at startup. This
/// trait exists only to fix the `broadcast_message` fan-out shape the
/// spec calls out for the cross-channel command case.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `text` to every joined channel except `exclude_channel`,
    /// optionally scoped to channels other than `source_channel`.
    /// Returns `(ok, total)`.
    async fn broadcast_message(&self, text: &str, source_channel: &str, exclude_channel: &str) -> (bool, usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_rest_client_reports_nothing_live() {
        let client = NullRestClient;
        assert!(client.get_stream("c1").await.is_none());
        assert!(client.get_user("u1").await.is_none());
        assert!(client.get_game("g1").await.is_none());
    }

    #[tokio::test]
    async fn null_push_provider_always_fails_to_connect() {
        let provider = NullPushProvider;
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        assert!(provider.connect(tx).await.is_err());
        assert!(!provider.is_alive().await);
    }
}
