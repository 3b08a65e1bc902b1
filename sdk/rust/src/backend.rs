//! The shared capability set every response producer implements
//! (spec.md §9 "Dynamic dispatch between backends").

use crate::error::BackendError;
use crate::types::{BackendRequest, BackendStats};

/// One of the three response producers the dispatcher chooses between.
///
/// Expressed as a trait object (`Arc<dyn Backend>`) rather than an enum
/// because the dispatcher only ever needs the capability set, never the
/// concrete type, and a closed three-element set still benefits from a
/// uniform call surface when scoring and invoking in a loop.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Stable name used in correlation records, logs, and config keys.
    fn name(&self) -> &'static str;

    /// Whether the backend is currently eligible for selection: circuit
    /// not open, no active rate-limit deadline, no sticky quota flag, and
    /// (for local/cloud) the provider gating option enables it.
    fn can_execute(&self) -> bool;

    /// Produce a reply. Implementations own their full timeout budget —
    /// the dispatcher never imposes an outer deadline.
    async fn invoke(&self, req: &BackendRequest) -> Result<String, BackendError>;

    /// Snapshot of this backend's bandit/circuit bookkeeping.
    fn stats(&self) -> BackendStats;

    /// Freeform metrics blob surfaced through introspection commands.
    fn metrics(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name(), "stats": self.stats() })
    }
}
