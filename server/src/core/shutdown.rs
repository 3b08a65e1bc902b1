//! Centralized shutdown management.
//!
//! Grounded on the teacher's `ShutdownService`: a `watch::channel` signal
//! plus a registry of background-task `JoinHandle`s, awaited under a
//! grace-period timeout. Trimmed from three drain targets (topics,
//! database, analytics) to one — the [`Bus`](crate::bus::Bus) — since
//! every component in this bot communicates through it rather than
//! through its own service with its own lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::constants::SHUTDOWN_TIMEOUT_SECS;
use crate::bus::Bus;

/// Centralized shutdown service for coordinating graceful shutdown.
#[derive(Clone)]
pub struct ShutdownService {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    bus: Arc<Bus>,
}

impl ShutdownService {
    pub fn new(bus: Arc<Bus>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            handles: Arc::new(Mutex::new(Vec::new())),
            bus,
        }
    }

    /// Register a background task handle to be awaited during shutdown.
    pub async fn register(&self, handle: JoinHandle<()>) {
        self.handles.lock().await.push(handle);
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Trigger shutdown.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Check if shutdown was triggered.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Trigger shutdown and wait for all registered tasks to complete.
    ///
    /// Shutdown order:
    /// 1. Signal all tasks to stop accepting new work.
    /// 2. Wait for background tasks (monitor poll/push loops, the
    ///    announcer, the command router) to finish their current cycle.
    /// 3. Drain every in-flight bus delivery (spec §4.1, §5
    ///    "Cancellation").
    pub async fn shutdown(&self) {
        tracing::debug!("initiating graceful shutdown");
        self.trigger();

        let handles = std::mem::take(&mut *self.handles.lock().await);
        let task_count = handles.len();
        tracing::debug!(count = task_count, "waiting for background tasks to finish");

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(_) => tracing::debug!("all background tasks completed"),
            Err(_) => tracing::warn!(timeout_secs = timeout.as_secs(), "timeout waiting for background tasks"),
        }

        tracing::debug!("draining in-flight bus deliveries");
        self.bus.wait_all().await;

        tracing::debug!("shutdown complete");
    }

    /// Wait for the shutdown signal. Returns an owned future suitable
    /// for a server's graceful-shutdown hook.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.rx.clone();
        async move {
            let _ = rx.wait_for(|&v| v).await;
        }
    }

    /// Install OS signal handlers and auto-trigger on Ctrl+C/SIGTERM.
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::debug!("received Ctrl+C, shutting down"),
                _ = terminate => tracing::debug!("received SIGTERM, shutting down"),
            }

            service.trigger();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_shutdown() -> ShutdownService {
        ShutdownService::new(Arc::new(Bus::new()))
    }

    #[tokio::test]
    async fn not_triggered_initially() {
        let shutdown = make_shutdown();
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn trigger_sets_flag() {
        let shutdown = make_shutdown();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn wait_returns_after_trigger() {
        let shutdown = make_shutdown();
        let wait_future = shutdown.wait();
        let handle = tokio::spawn(wait_future);

        tokio::task::yield_now().await;
        shutdown.trigger();

        tokio::time::timeout(std::time::Duration::from_millis(100), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn subscriber_receives_shutdown() {
        let shutdown = make_shutdown();
        let rx = shutdown.subscribe();

        assert!(!*rx.borrow());
        shutdown.trigger();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn shutdown_drains_bus_and_registered_tasks() {
        let bus = Arc::new(Bus::new());
        let shutdown = ShutdownService::new(bus.clone());

        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });
        shutdown.register(handle).await;

        shutdown.shutdown().await;
        assert!(shutdown.is_triggered());
        let stats = bus.stats().await;
        assert_eq!(stats.in_flight, 0);
    }
}
