//! Shared request/response/stats shapes (spec.md §3, §4.3–§4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intent label produced by the classifier. `Lookup` is carried as a
/// variant of the pattern-pool key space (reflex pools still have a
/// `lookup` pool per spec §4.2) but the classifier itself only ever
/// emits the three live classes — see DESIGN.md for the open question
/// this resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    Ping,
    GenShort,
    GenLong,
}

impl Class {
    pub const ALL: [Class; 3] = [Class::Ping, Class::GenShort, Class::GenLong];

    pub fn as_str(&self) -> &'static str {
        match self {
            Class::Ping => "ping",
            Class::GenShort => "gen_short",
            Class::GenLong => "gen_long",
        }
    }
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calling context a prompt arrived under (spec.md §4.3 request table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// `!ask` command path.
    Ask,
    /// `@bot` mention path.
    Mention,
    /// Raw prompt sent without wrapping — spec.md §9 open question, the
    /// `pre_optimized` bypass. No production caller reaches this; kept
    /// for completeness and direct backend testing.
    Direct,
    /// Neither ask nor mention (spec's "neither" row).
    Other,
}

impl Context {
    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Ask => "ask",
            Context::Mention => "mention",
            Context::Direct => "direct",
            Context::Other => "other",
        }
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request dispatched to a backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub prompt: String,
    pub context: Context,
    pub class: Class,
    pub correlation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-backend bookkeeping (spec.md §3 BackendStats). Sole writer is the
/// owning backend; the dispatcher only ever reads a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStats {
    pub name: &'static str,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub ema_success_rate: f64,
    pub ema_latency_secs: f64,
    pub trials: u64,
    pub cumulative_reward: f64,
    pub success_count: u64,
    pub rate_limit_deadline: Option<DateTime<Utc>>,
    pub quota_exhausted: bool,
    pub backoff_secs: f64,
}

impl BackendStats {
    pub fn avg_reward(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.cumulative_reward / self.trials as f64
        }
    }
}
