use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::LlmProvider;
use super::constants::{
    ENV_BOT_NAME, ENV_CHANNELS, ENV_CONFIG, ENV_DEBUG, ENV_LLM_PROVIDER, ENV_LOG,
};

#[derive(Parser)]
#[command(name = "synapse-bot")]
#[command(version, about = "Multi-channel Twitch neural chat bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Comma-separated list of channels to join and monitor, overrides `[channels] list`
    #[arg(long, global = true, env = ENV_CHANNELS, value_delimiter = ',')]
    pub channels: Option<Vec<String>>,

    /// Bot display name, used in prompt wrappers and mention detection
    #[arg(long, global = true, env = ENV_BOT_NAME)]
    pub bot_name: Option<String>,

    /// LLM provider gating (local, cloud, or auto)
    #[arg(long, global = true, env = ENV_LLM_PROVIDER, value_parser = parse_llm_provider)]
    pub llm_provider: Option<LlmProvider>,

    /// Stream-status monitoring method (auto, push, or poll)
    #[arg(long, global = true, value_parser = parse_monitoring_method)]
    pub monitoring_method: Option<MonitoringMethod>,

    /// Disable stream-status monitoring entirely
    #[arg(long, global = true)]
    pub no_monitoring: bool,

    /// Log level / tracing-subscriber env-filter
    #[arg(long, global = true, env = ENV_LOG)]
    pub log_level: Option<String>,

    /// Enable debug mode (verbose chunk-level streaming logs)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,
}

/// Stream-status monitoring method, mirrors `announcements.monitoring.method`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringMethod {
    Auto,
    Push,
    Poll,
}

fn parse_llm_provider(s: &str) -> Result<LlmProvider, String> {
    match s.to_lowercase().as_str() {
        "local" => Ok(LlmProvider::Local),
        "cloud" => Ok(LlmProvider::Cloud),
        "auto" => Ok(LlmProvider::Auto),
        _ => Err(format!(
            "Invalid LLM provider '{}'. Valid options: local, cloud, auto",
            s
        )),
    }
}

fn parse_monitoring_method(s: &str) -> Result<MonitoringMethod, String> {
    match s.to_lowercase().as_str() {
        "auto" => Ok(MonitoringMethod::Auto),
        "push" => Ok(MonitoringMethod::Push),
        "poll" => Ok(MonitoringMethod::Poll),
        _ => Err(format!(
            "Invalid monitoring method '{}'. Valid options: auto, push, poll",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the bot (default command)
    Start,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (secrets file, caches). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub channels: Option<Vec<String>>,
    pub bot_name: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub monitoring_method: Option<MonitoringMethod>,
    pub no_monitoring: bool,
    pub log_level: Option<String>,
    pub debug: bool,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        channels: cli.channels,
        bot_name: cli.bot_name,
        llm_provider: cli.llm_provider,
        monitoring_method: cli.monitoring_method,
        no_monitoring: cli.no_monitoring,
        log_level: cli.log_level,
        debug: cli.debug,
    };
    (config, cli.command)
}
