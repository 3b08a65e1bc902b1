//! # synapse-backends
//!
//! Pluggable response-generation backends for a Twitch chat bot's neural
//! dispatcher: an always-available templated `ReflexBackend`, a streaming
//! `LocalBackend` for a fast local chat-completion endpoint, and a
//! non-streaming `CloudBackend` for a slow high-quality remote one.
//!
//! All three share the [`Backend`] trait so a dispatcher can hold them
//! behind a small fixed-size collection and score them with a bandit
//! without knowing which concrete backend it's talking to. Each backend
//! owns its own circuit breaker ([`stats::StatsCell`]) and reports
//! [`types::BackendStats`] for that scoring.

pub mod backend;
pub mod cloud;
pub mod error;
pub mod local;
pub mod postprocess;
pub mod prompt;
pub mod reflex;
pub mod reward;
pub mod stats;
pub mod types;

pub use backend::Backend;
pub use cloud::{CloudBackend, CloudBackendConfig};
pub use error::BackendError;
pub use local::{LocalBackend, LocalBackendConfig};
pub use reflex::{PoolKey, ReflexBackend};
pub use reward::{shape as shape_reward, RewardWeights};
pub use stats::StatsCell;
pub use types::{BackendRequest, BackendStats, CircuitState, Class, Context};
