//! Core application infrastructure.

pub mod cli;
pub mod config;
pub mod constants;
pub mod secret;
pub mod shutdown;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands, MonitoringMethod, SystemCommands};
pub use config::{AppConfig, LlmProvider};
pub use secret::SecretManager;
pub use shutdown::ShutdownService;
