//! Chooses push vs. poll monitoring and owns whichever is active (spec
//! §4.10).
//!
//! In `auto` mode both collaborators are constructed up front and the
//! supervisor tries push first, falling back synchronously to polling the
//! moment the push provider fails to connect — there is no flapping back
//! to push once that fallback has happened for this run.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::Bus;
use crate::collaborators::{PushProvider, RestClient};
use crate::core::MonitoringMethod;
use crate::eventsub::EventSubClient;
use crate::monitor::StreamMonitor;

/// Owns the single background task that is actually monitoring stream
/// status for this run, plus a record of which mechanism was chosen.
pub struct MonitorSupervisor {
    handle: JoinHandle<()>,
    active: &'static str,
}

impl MonitorSupervisor {
    pub fn active_mechanism(&self) -> &'static str {
        self.active
    }

    pub fn handle(self) -> JoinHandle<()> {
        self.handle
    }

    /// Builds and starts the monitoring mechanism implied by `method`
    /// (spec §4.10 "Monitoring method selection"):
    /// - `Push`: always starts `EventSubClient`, even if `connect` fails
    ///   (the client's own reconnect loop keeps trying).
    /// - `Poll`: always starts `StreamMonitor`.
    /// - `Auto`: tries `EventSubClient.provider.connect` eagerly; starts
    ///   `EventSubClient` on success, falls back to `StreamMonitor`
    ///   otherwise.
    pub async fn start(
        method: MonitoringMethod,
        channels: Vec<String>,
        channel_ids: HashMap<String, String>,
        polling_interval_secs: u64,
        rest: Arc<dyn RestClient>,
        push: Arc<dyn PushProvider>,
        bus: Arc<Bus>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        match method {
            MonitoringMethod::Poll => {
                let monitor = Arc::new(StreamMonitor::new(channels, polling_interval_secs, rest, bus));
                Self {
                    handle: monitor.start(shutdown_rx),
                    active: "poll",
                }
            }
            MonitoringMethod::Push => {
                let client = Arc::new(EventSubClient::new(channel_ids, push, bus));
                Self {
                    handle: client.start(shutdown_rx),
                    active: "push",
                }
            }
            MonitoringMethod::Auto => {
                let (probe_tx, _probe_rx) = tokio::sync::mpsc::unbounded_channel();
                if push.connect(probe_tx).await.is_ok() {
                    tracing::debug!("auto monitoring: eventsub connected, using push");
                    push.disconnect().await;
                    let client = Arc::new(EventSubClient::new(channel_ids, push, bus));
                    Self {
                        handle: client.start(shutdown_rx),
                        active: "push",
                    }
                } else {
                    tracing::debug!("auto monitoring: eventsub unavailable, falling back to polling");
                    let monitor = Arc::new(StreamMonitor::new(channels, polling_interval_secs, rest, bus));
                    Self {
                        handle: monitor.start(shutdown_rx),
                        active: "poll",
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullPushProvider, NullRestClient};

    #[tokio::test]
    async fn auto_mode_falls_back_to_poll_when_push_unavailable() {
        let (_tx, rx) = watch::channel(false);
        let supervisor = MonitorSupervisor::start(
            MonitoringMethod::Auto,
            vec!["chan".to_string()],
            HashMap::new(),
            60,
            Arc::new(NullRestClient),
            Arc::new(NullPushProvider),
            Arc::new(Bus::new()),
            rx,
        )
        .await;
        assert_eq!(supervisor.active_mechanism(), "poll");
        supervisor.handle().abort();
    }

    #[tokio::test]
    async fn poll_mode_always_starts_poll_mechanism() {
        let (_tx, rx) = watch::channel(false);
        let supervisor = MonitorSupervisor::start(
            MonitoringMethod::Poll,
            vec!["chan".to_string()],
            HashMap::new(),
            60,
            Arc::new(NullRestClient),
            Arc::new(NullPushProvider),
            Arc::new(Bus::new()),
            rx,
        )
        .await;
        assert_eq!(supervisor.active_mechanism(), "poll");
        supervisor.handle().abort();
    }
}
