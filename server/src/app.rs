//! Top-level application wiring (spec §5 "Startup sequence").
//!
//! Grounded on the teacher's `CoreApp::run`/`init`/`start_background_tasks`
//! shape: parse CLI, load config, init logging, build every subsystem,
//! wire it onto the [`Bus`], install signal handlers, then block on the
//! shutdown signal and drain. Trimmed of every concern this bot doesn't
//! have (HTTP API server, OTLP ingestion, background data pruning against
//! an embedded database) since nothing here serves external traffic.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use synapse_backends::{Backend, CloudBackend, CloudBackendConfig, LocalBackend, LocalBackendConfig, ReflexBackend};

use crate::announcer::Announcer;
use crate::bus::Bus;
use crate::cache::ResponseCache;
use crate::classifier::Classifier;
use crate::collaborators::{NullPushProvider, NullRestClient, PushProvider, RestClient};
use crate::core::cli::{self, Commands, SystemCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{DEFAULT_COMMAND_PREFIX, DEFAULT_DRIFT_PHRASES, DEFAULT_PING_PATTERNS, END_MARKER, ENV_LOG, LONG_FORM_COMMAND_TOKEN};
use crate::core::secret::SecretManager;
use crate::core::shutdown::ShutdownService;
use crate::dispatcher::Dispatcher;
use crate::router::CommandRouter;
use crate::supervisor::MonitorSupervisor;

/// Entry point used by `main.rs`. Owns no state itself — every
/// long-lived object is constructed and wired inside `start`.
pub struct CoreApp;

impl CoreApp {
    pub async fn run() -> Result<()> {
        let (cli_config, command) = cli::parse();

        match command {
            Some(Commands::System { command }) => Self::handle_system_command(command).await,
            _ => Self::start(cli_config).await,
        }
    }

    async fn handle_system_command(command: SystemCommands) -> Result<()> {
        match command {
            SystemCommands::Prune { yes } => {
                if !yes {
                    eprint!("This deletes the local secrets file. Continue? [y/N] ");
                    use std::io::Write;
                    std::io::stdout().flush().ok();
                    let mut answer = String::new();
                    std::io::stdin().read_line(&mut answer).ok();
                    if !answer.trim().eq_ignore_ascii_case("y") {
                        println!("aborted.");
                        return Ok(());
                    }
                }
                SecretManager::prune()?;
                println!("pruned local data.");
                Ok(())
            }
        }
    }

    async fn start(cli_config: cli::CliConfig) -> Result<()> {
        let config = AppConfig::load(&cli_config)?;
        Self::init_logging(&config)?;

        tracing::info!(bot = %config.bot.name, channels = ?config.channels.list, "starting synapse-bot");

        let secrets = SecretManager::load(&config)?;
        let bus = Arc::new(Bus::new());
        let shutdown = ShutdownService::new(bus.clone());
        shutdown.install_signal_handlers();

        let backends = Self::build_backends(&config, &secrets);
        tracing::info!(backends = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(), "backends ready");

        let classifier = Classifier::new(
            LONG_FORM_COMMAND_TOKEN,
            DEFAULT_PING_PATTERNS.iter().map(|s| s.to_string()).collect(),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            backends,
            classifier,
            config.neural_llm.ucb_exploration_factor,
            config.neural_llm.min_trials_per_synapse,
        ));

        // Wired for `!joke`-style out-of-scope commands that a future
        // handler registers against the router; unused directly by the
        // in-scope subsystems this core builds.
        let _response_cache = Arc::new(ResponseCache::with_config(
            config.commands.cache.joke_ttl_secs,
            config.commands.cache.joke_max_size,
        ));

        let router = Arc::new(CommandRouter::new(
            config.bot.name.clone(),
            DEFAULT_COMMAND_PREFIX,
            config.commands.cooldowns.mention_secs,
            config.commands.cooldowns.ask_secs,
            dispatcher.clone(),
            bus.clone(),
        ));
        router.install().await;

        let announcer = Arc::new(Announcer::new(
            config.announcements.stream_online.clone(),
            config.announcements.stream_offline.clone(),
            bus.clone(),
        ));
        announcer.install().await;

        if config.announcements.monitoring.enabled {
            let rest: Arc<dyn RestClient> = Arc::new(NullRestClient);
            let push: Arc<dyn PushProvider> = Arc::new(NullPushProvider);
            let supervisor = MonitorSupervisor::start(
                config.announcements.monitoring.method,
                config.channels.list.clone(),
                HashMap::new(),
                config.announcements.monitoring.polling_interval_secs,
                rest,
                push,
                bus.clone(),
                shutdown.subscribe(),
            )
            .await;
            tracing::info!(mechanism = supervisor.active_mechanism(), "stream monitoring active");
            shutdown.register(supervisor.handle()).await;
        } else {
            tracing::info!("stream monitoring disabled");
        }

        shutdown.wait().await;
        shutdown.shutdown().await;
        Ok(())
    }

    /// Builds the backend roster: reflex is always present, local/cloud
    /// gated by `llm.provider` and, for cloud, by whether a credential
    /// resolved at all (spec §4.3/§4.4 "Backend availability").
    fn build_backends(config: &AppConfig, secrets: &SecretManager) -> Vec<Arc<dyn Backend>> {
        let mut backends: Vec<Arc<dyn Backend>> = vec![Arc::new(ReflexBackend::new())];
        let drift_phrases: Vec<String> = DEFAULT_DRIFT_PHRASES.iter().map(|s| s.to_string()).collect();

        if config.llm.provider.local_enabled() {
            backends.push(Arc::new(LocalBackend::new(LocalBackendConfig {
                endpoint: config.llm.model_endpoint.clone(),
                model: config.llm.model_name.clone(),
                language: config.llm.language.clone(),
                enabled: true,
                bot_name: config.bot.name.clone(),
                personality: config.bot.personality.clone(),
                use_personality_on_mention: config.llm.use_personality_on_mention,
                use_personality_on_ask: config.llm.use_personality_on_ask,
                timeout_connect: std::time::Duration::from_secs(config.neural_llm.timeout_connect_secs),
                timeout_inference: std::time::Duration::from_secs(config.neural_llm.timeout_inference_secs),
                timeout_write: std::time::Duration::from_secs(config.neural_llm.timeout_write_secs),
                timeout_pool: std::time::Duration::from_secs(config.neural_llm.timeout_pool_secs),
                ema_alpha: config.neural_llm.ema_alpha_local,
                failure_threshold: config.neural_llm.local_failure_threshold,
                recovery_secs: config.neural_llm.local_recovery_secs,
                drift_phrases: drift_phrases.clone(),
                end_marker: END_MARKER.to_string(),
            })));
        }

        if config.llm.provider.cloud_enabled() {
            match secrets.openai_key() {
                Some(api_key) => {
                    backends.push(Arc::new(CloudBackend::new(CloudBackendConfig {
                        endpoint: config.llm.model_endpoint.clone(),
                        model: config.llm.model_name.clone(),
                        api_key: api_key.to_string(),
                        enabled: true,
                        bot_name: config.bot.name.clone(),
                        personality: config.bot.personality.clone(),
                        use_personality_on_mention: config.llm.use_personality_on_mention,
                        use_personality_on_ask: config.llm.use_personality_on_ask,
                        timeout_connect: std::time::Duration::from_secs(config.neural_llm.timeout_connect_secs),
                        timeout_inference: std::time::Duration::from_secs(config.neural_llm.timeout_inference_secs),
                        timeout_write: std::time::Duration::from_secs(config.neural_llm.timeout_write_secs),
                        timeout_pool: std::time::Duration::from_secs(config.neural_llm.timeout_pool_secs),
                        ema_alpha: config.neural_llm.ema_alpha_cloud,
                        failure_threshold: config.neural_llm.cloud_failure_threshold,
                        recovery_secs: config.neural_llm.cloud_recovery_secs,
                        drift_phrases,
                        end_marker: END_MARKER.to_string(),
                    })));
                }
                None => {
                    tracing::warn!("llm.provider enables cloud but no api key resolved, skipping cloud backend");
                }
            }
        }

        backends
    }

    fn init_logging(config: &AppConfig) -> Result<()> {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| config.log_level.clone());
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .try_init()
            .ok();
        Ok(())
    }
}
