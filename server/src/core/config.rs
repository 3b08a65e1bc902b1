//! Application configuration (spec §6 "Configuration surface").
//!
//! Layered the way the teacher's `AppConfig::load` layers profile-dir
//! config -> local/CLI-specified file -> CLI args/env, except the file
//! format is TOML rather than JSON (spec §6's dotted sections,
//! `[llm.inference.ask]` etc., map onto TOML tables directly). Precedence,
//! lowest to highest: defaults -> profile dir file -> local/CLI file ->
//! CLI args/env.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::{CliConfig, MonitoringMethod};
use super::constants::*;
use crate::utils::file::expand_path;

/// `llm.provider` — gates which of Local/Cloud report `can_execute`
/// (spec §4.3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Local,
    Cloud,
    Auto,
}

impl LlmProvider {
    pub fn local_enabled(self) -> bool {
        matches!(self, LlmProvider::Local | LlmProvider::Auto)
    }

    pub fn cloud_enabled(self) -> bool {
        matches!(self, LlmProvider::Cloud | LlmProvider::Auto)
    }
}

impl Default for LlmProvider {
    fn default() -> Self {
        LlmProvider::Auto
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub name: String,
    pub personality: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BOT_NAME.to_string(),
            personality: DEFAULT_BOT_PERSONALITY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceOverride {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub stop_tokens: Option<Vec<String>>,
}

impl Default for InferenceOverride {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            repeat_penalty: None,
            stop_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InferenceConfig {
    pub ask: InferenceOverride,
    pub mention: InferenceOverride,
    pub gen_long: InferenceOverride,
    pub joke: InferenceOverride,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model_endpoint: String,
    pub model_name: String,
    pub language: String,
    pub debug_streaming: bool,
    pub use_personality_on_mention: bool,
    pub use_personality_on_ask: bool,
    pub inference: InferenceConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Auto,
            model_endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            debug_streaming: false,
            use_personality_on_mention: true,
            use_personality_on_ask: false,
            inference: InferenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApisConfig {
    /// Resolved separately by `SecretManager`; kept here only so a file
    /// config can supply it as a last-resort fallback.
    pub openai_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApisConfig {
    fn default() -> Self {
        Self {
            openai_key: None,
            timeout_secs: DEFAULT_REST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CooldownsConfig {
    pub ask_secs: u64,
    pub joke_secs: u64,
    pub mention_secs: u64,
}

impl Default for CooldownsConfig {
    fn default() -> Self {
        Self {
            ask_secs: DEFAULT_COOLDOWN_ASK_SECS,
            joke_secs: DEFAULT_COOLDOWN_JOKE_SECS,
            mention_secs: DEFAULT_COOLDOWN_MENTION_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub joke_ttl_secs: u64,
    pub joke_max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            joke_ttl_secs: DEFAULT_JOKE_CACHE_TTL_SECS,
            joke_max_size: DEFAULT_JOKE_CACHE_MAX_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandsConfig {
    pub cooldowns: CooldownsConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct NeuralLlmConfig {
    pub ucb_exploration_factor: f64,
    pub min_trials_per_synapse: u64,
    pub ema_alpha_local: f64,
    pub ema_alpha_cloud: f64,
    pub local_failure_threshold: u32,
    pub local_recovery_secs: u64,
    pub cloud_failure_threshold: u32,
    pub cloud_recovery_secs: u64,
    pub timeout_connect_secs: u64,
    pub timeout_inference_secs: u64,
    pub timeout_write_secs: u64,
    pub timeout_pool_secs: u64,
}

impl Default for NeuralLlmConfig {
    fn default() -> Self {
        Self {
            ucb_exploration_factor: DEFAULT_UCB_EXPLORATION_FACTOR,
            min_trials_per_synapse: DEFAULT_MIN_TRIALS_PER_SYNAPSE,
            ema_alpha_local: DEFAULT_EMA_ALPHA_LOCAL,
            ema_alpha_cloud: DEFAULT_EMA_ALPHA_CLOUD,
            local_failure_threshold: DEFAULT_LOCAL_FAILURE_THRESHOLD,
            local_recovery_secs: DEFAULT_LOCAL_RECOVERY_SECS,
            cloud_failure_threshold: DEFAULT_CLOUD_FAILURE_THRESHOLD,
            cloud_recovery_secs: DEFAULT_CLOUD_RECOVERY_SECS,
            timeout_connect_secs: DEFAULT_TIMEOUT_CONNECT_SECS,
            timeout_inference_secs: DEFAULT_TIMEOUT_INFERENCE_SECS,
            timeout_write_secs: DEFAULT_TIMEOUT_WRITE_SECS,
            timeout_pool_secs: DEFAULT_TIMEOUT_POOL_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnounceTemplate {
    pub enabled: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub method: MonitoringMethod,
    pub polling_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: MonitoringMethod::Auto,
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnouncementsConfig {
    pub stream_online: AnnounceTemplate,
    pub stream_offline: AnnounceTemplate,
    pub monitoring: MonitoringConfig,
}

impl Default for AnnouncementsConfig {
    fn default() -> Self {
        Self {
            stream_online: AnnounceTemplate {
                enabled: true,
                message: DEFAULT_ONLINE_TEMPLATE.to_string(),
            },
            stream_offline: AnnounceTemplate {
                enabled: true,
                message: DEFAULT_OFFLINE_TEMPLATE.to_string(),
            },
            monitoring: MonitoringConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelsConfig {
    pub list: Vec<String>,
}

/// Fully resolved configuration: CLI/env overrides already applied over
/// file values over built-in defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub llm: LlmConfig,
    pub apis: ApisConfig,
    pub commands: CommandsConfig,
    pub neural_llm: NeuralLlmConfig,
    pub announcements: AnnouncementsConfig,
    pub channels: ChannelsConfig,
    pub log_level: String,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            llm: LlmConfig::default(),
            apis: ApisConfig::default(),
            commands: CommandsConfig::default(),
            neural_llm: NeuralLlmConfig::default(),
            announcements: AnnouncementsConfig::default(),
            channels: ChannelsConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            debug: false,
        }
    }
}

// ---------------------------------------------------------------------
// On-disk shape: every field optional so a partial file only overrides
// what it mentions. Mirrors the teacher's `FileConfig` + per-section
// `*FileConfig` sub-structs; unknown top-level keys are logged rather
// than rejected, via `extra`.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct BotFileConfig {
    name: Option<String>,
    personality: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InferenceOverrideFile {
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    repeat_penalty: Option<f32>,
    stop_tokens: Option<Vec<String>>,
}

impl InferenceOverrideFile {
    fn merge_into(self, target: &mut InferenceOverride) {
        if self.max_tokens.is_some() {
            target.max_tokens = self.max_tokens;
        }
        if self.temperature.is_some() {
            target.temperature = self.temperature;
        }
        if self.repeat_penalty.is_some() {
            target.repeat_penalty = self.repeat_penalty;
        }
        if self.stop_tokens.is_some() {
            target.stop_tokens = self.stop_tokens;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InferenceFileConfig {
    ask: Option<InferenceOverrideFile>,
    mention: Option<InferenceOverrideFile>,
    gen_long: Option<InferenceOverrideFile>,
    joke: Option<InferenceOverrideFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmFileConfig {
    provider: Option<LlmProvider>,
    model_endpoint: Option<String>,
    model_name: Option<String>,
    language: Option<String>,
    debug_streaming: Option<bool>,
    use_personality_on_mention: Option<bool>,
    use_personality_on_ask: Option<bool>,
    inference: Option<InferenceFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApisFileConfig {
    openai_key: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CooldownsFileConfig {
    ask: Option<u64>,
    joke: Option<u64>,
    mention: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CommandsCacheFileConfig {
    joke_ttl: Option<u64>,
    joke_max_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CommandsFileConfig {
    cooldowns: Option<CooldownsFileConfig>,
    cache: Option<CommandsCacheFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NeuralLlmFileConfig {
    ucb_exploration_factor: Option<f64>,
    min_trials_per_synapse: Option<u64>,
    ema_alpha: Option<f64>,
    local_failure_threshold: Option<u32>,
    local_recovery_time: Option<u64>,
    cloud_failure_threshold: Option<u32>,
    cloud_recovery_time: Option<u64>,
    timeout_connect: Option<u64>,
    timeout_inference: Option<u64>,
    timeout_write: Option<u64>,
    timeout_pool: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AnnounceTemplateFile {
    enabled: Option<bool>,
    message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MonitoringFileConfig {
    enabled: Option<bool>,
    method: Option<String>,
    polling_interval: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AnnouncementsFileConfig {
    stream_online: Option<AnnounceTemplateFile>,
    stream_offline: Option<AnnounceTemplateFile>,
    monitoring: Option<MonitoringFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChannelsFileConfig {
    list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    bot: Option<BotFileConfig>,
    llm: Option<LlmFileConfig>,
    apis: Option<ApisFileConfig>,
    commands: Option<CommandsFileConfig>,
    neural_llm: Option<NeuralLlmFileConfig>,
    announcements: Option<AnnouncementsFileConfig>,
    channels: Option<ChannelsFileConfig>,
    log_level: Option<String>,
    #[serde(flatten)]
    extra: std::collections::BTreeMap<String, toml::Value>,
}

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "bot",
    "llm",
    "apis",
    "commands",
    "neural_llm",
    "announcements",
    "channels",
    "log_level",
];

impl FileConfig {
    fn load_from_file(path: &std::path::Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.warn_unknown_fields(path);
        Ok(config)
    }

    fn warn_unknown_fields(&self, path: &std::path::Path) {
        for key in self.extra.keys() {
            if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                tracing::warn!(
                    path = %path.display(),
                    key = %key,
                    "unknown top-level config key ignored"
                );
            }
        }
    }

    /// Shallow-merge `other` over `self`, `Some` wins, nested tables
    /// merge field by field.
    fn merge(&mut self, other: FileConfig) {
        self.bot = match (self.bot.take(), other.bot) {
            (Some(mut base), Some(over)) => {
                if over.name.is_some() {
                    base.name = over.name;
                }
                if over.personality.is_some() {
                    base.personality = over.personality;
                }
                Some(base)
            }
            (base, over) => over.or(base),
        };
        self.llm = match (self.llm.take(), other.llm) {
            (Some(mut base), Some(over)) => {
                if over.provider.is_some() {
                    base.provider = over.provider;
                }
                if over.model_endpoint.is_some() {
                    base.model_endpoint = over.model_endpoint;
                }
                if over.model_name.is_some() {
                    base.model_name = over.model_name;
                }
                if over.language.is_some() {
                    base.language = over.language;
                }
                if over.debug_streaming.is_some() {
                    base.debug_streaming = over.debug_streaming;
                }
                if over.use_personality_on_mention.is_some() {
                    base.use_personality_on_mention = over.use_personality_on_mention;
                }
                if over.use_personality_on_ask.is_some() {
                    base.use_personality_on_ask = over.use_personality_on_ask;
                }
                if over.inference.is_some() {
                    base.inference = over.inference;
                }
                Some(base)
            }
            (base, over) => over.or(base),
        };
        self.apis = other.apis.or(self.apis.take());
        self.commands = other.commands.or(self.commands.take());
        self.neural_llm = other.neural_llm.or(self.neural_llm.take());
        self.announcements = other.announcements.or(self.announcements.take());
        self.channels = other.channels.or(self.channels.take());
        self.log_level = other.log_level.or(self.log_level.take());
    }
}

fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

fn resolve_monitoring_method(raw: &str) -> Result<MonitoringMethod> {
    match raw.to_lowercase().as_str() {
        "auto" => Ok(MonitoringMethod::Auto),
        "push" => Ok(MonitoringMethod::Push),
        "poll" => Ok(MonitoringMethod::Poll),
        other => anyhow::bail!(
            "invalid announcements.monitoring.method '{}'. valid options: auto, push, poll",
            other
        ),
    }
}

impl AppConfig {
    /// Load configuration from all sources.
    ///
    /// Priority, lowest to highest:
    /// 1. Built-in defaults
    /// 2. Profile directory config (`~/.synapse-bot/synapse-bot.toml`)
    /// 3. Local directory config, or the path given by `--config`
    /// 4. CLI arguments (which already carry env-var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path() {
            if profile_path.exists() {
                let profile_config = FileConfig::load_from_file(&profile_path)?;
                file_config.merge(profile_config);
                found_configs.push(profile_path.display().to_string());
            }
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                None
            }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "config files loaded");

        let file_bot = file_config.bot.unwrap_or_default();
        let file_llm = file_config.llm.unwrap_or_default();
        let file_inference = file_llm.inference.clone().unwrap_or_default();
        let file_apis = file_config.apis.unwrap_or_default();
        let file_commands = file_config.commands.unwrap_or_default();
        let file_cooldowns = file_commands.cooldowns.unwrap_or_default();
        let file_cache = file_commands.cache.unwrap_or_default();
        let file_neural = file_config.neural_llm.unwrap_or_default();
        let file_announce = file_config.announcements.unwrap_or_default();
        let file_monitoring = file_announce.monitoring.clone().unwrap_or_default();
        let file_channels = file_config.channels.unwrap_or_default();

        let defaults = AppConfig::default();

        let mut inference = InferenceConfig::default();
        if let Some(ask) = file_inference.ask {
            ask.merge_into(&mut inference.ask);
        }
        if let Some(mention) = file_inference.mention {
            mention.merge_into(&mut inference.mention);
        }
        if let Some(gen_long) = file_inference.gen_long {
            gen_long.merge_into(&mut inference.gen_long);
        }
        if let Some(joke) = file_inference.joke {
            joke.merge_into(&mut inference.joke);
        }

        let mut llm = LlmConfig {
            provider: file_llm.provider.unwrap_or(defaults.llm.provider),
            model_endpoint: file_llm.model_endpoint.unwrap_or(defaults.llm.model_endpoint.clone()),
            model_name: file_llm.model_name.unwrap_or(defaults.llm.model_name.clone()),
            language: file_llm.language.unwrap_or(defaults.llm.language.clone()),
            debug_streaming: file_llm.debug_streaming.unwrap_or(defaults.llm.debug_streaming),
            use_personality_on_mention: file_llm
                .use_personality_on_mention
                .unwrap_or(defaults.llm.use_personality_on_mention),
            use_personality_on_ask: file_llm
                .use_personality_on_ask
                .unwrap_or(defaults.llm.use_personality_on_ask),
            inference,
        };

        if let Some(provider) = cli.llm_provider {
            llm.provider = provider;
        }
        if cli.debug {
            llm.debug_streaming = true;
        }

        let apis = ApisConfig {
            openai_key: file_apis.openai_key,
            timeout_secs: file_apis.timeout.unwrap_or(defaults.apis.timeout_secs),
        };

        let cooldowns = CooldownsConfig {
            ask_secs: file_cooldowns.ask.unwrap_or(defaults.commands.cooldowns.ask_secs),
            joke_secs: file_cooldowns.joke.unwrap_or(defaults.commands.cooldowns.joke_secs),
            mention_secs: file_cooldowns
                .mention
                .unwrap_or(defaults.commands.cooldowns.mention_secs),
        };
        let cache = CacheConfig {
            joke_ttl_secs: file_cache.joke_ttl.unwrap_or(defaults.commands.cache.joke_ttl_secs),
            joke_max_size: file_cache
                .joke_max_size
                .unwrap_or(defaults.commands.cache.joke_max_size),
        };

        let neural_llm = NeuralLlmConfig {
            ucb_exploration_factor: file_neural
                .ucb_exploration_factor
                .unwrap_or(defaults.neural_llm.ucb_exploration_factor),
            min_trials_per_synapse: file_neural
                .min_trials_per_synapse
                .unwrap_or(defaults.neural_llm.min_trials_per_synapse),
            ema_alpha_local: file_neural.ema_alpha.unwrap_or(defaults.neural_llm.ema_alpha_local),
            ema_alpha_cloud: file_neural.ema_alpha.unwrap_or(defaults.neural_llm.ema_alpha_cloud),
            local_failure_threshold: file_neural
                .local_failure_threshold
                .unwrap_or(defaults.neural_llm.local_failure_threshold),
            local_recovery_secs: file_neural
                .local_recovery_time
                .unwrap_or(defaults.neural_llm.local_recovery_secs),
            cloud_failure_threshold: file_neural
                .cloud_failure_threshold
                .unwrap_or(defaults.neural_llm.cloud_failure_threshold),
            cloud_recovery_secs: file_neural
                .cloud_recovery_time
                .unwrap_or(defaults.neural_llm.cloud_recovery_secs),
            timeout_connect_secs: file_neural
                .timeout_connect
                .unwrap_or(defaults.neural_llm.timeout_connect_secs),
            timeout_inference_secs: file_neural
                .timeout_inference
                .unwrap_or(defaults.neural_llm.timeout_inference_secs),
            timeout_write_secs: file_neural
                .timeout_write
                .unwrap_or(defaults.neural_llm.timeout_write_secs),
            timeout_pool_secs: file_neural
                .timeout_pool
                .unwrap_or(defaults.neural_llm.timeout_pool_secs),
        };

        let stream_online = file_announce
            .stream_online
            .map(|t| AnnounceTemplate {
                enabled: t.enabled.unwrap_or(defaults.announcements.stream_online.enabled),
                message: t.message.unwrap_or(defaults.announcements.stream_online.message.clone()),
            })
            .unwrap_or(defaults.announcements.stream_online.clone());
        let stream_offline = file_announce
            .stream_offline
            .map(|t| AnnounceTemplate {
                enabled: t.enabled.unwrap_or(defaults.announcements.stream_offline.enabled),
                message: t
                    .message
                    .unwrap_or(defaults.announcements.stream_offline.message.clone()),
            })
            .unwrap_or(defaults.announcements.stream_offline.clone());

        let mut monitoring = MonitoringConfig {
            enabled: file_monitoring.enabled.unwrap_or(defaults.announcements.monitoring.enabled),
            method: match file_monitoring.method {
                Some(raw) => resolve_monitoring_method(&raw)?,
                None => defaults.announcements.monitoring.method,
            },
            polling_interval_secs: file_monitoring
                .polling_interval
                .unwrap_or(defaults.announcements.monitoring.polling_interval_secs),
        };

        if let Some(method) = cli.monitoring_method {
            monitoring.method = method;
        }
        if cli.no_monitoring {
            monitoring.enabled = false;
        }

        let mut channels = ChannelsConfig {
            list: file_channels.list.unwrap_or_default(),
        };
        if let Some(ref cli_channels) = cli.channels {
            channels.list = cli_channels.clone();
        }

        let bot_name = cli
            .bot_name
            .clone()
            .or(file_bot.name)
            .unwrap_or(defaults.bot.name.clone());
        let bot = BotConfig {
            name: bot_name,
            personality: file_bot.personality.unwrap_or(defaults.bot.personality.clone()),
        };

        let log_level = cli
            .log_level
            .clone()
            .or(file_config.log_level)
            .unwrap_or(defaults.log_level.clone());

        let config = AppConfig {
            bot,
            llm,
            apis,
            commands: CommandsConfig { cooldowns, cache },
            neural_llm,
            announcements: AnnouncementsConfig {
                stream_online,
                stream_offline,
                monitoring,
            },
            channels,
            log_level,
            debug: cli.debug,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.channels.list.is_empty() {
            anyhow::bail!(
                "no channels configured: set `channels.list` in the config file or pass --channels"
            );
        }
        if self.bot.name.trim().is_empty() {
            anyhow::bail!("bot.name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> CliConfig {
        CliConfig {
            channels: Some(vec!["c1".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_pass_validation_with_channels_from_cli() {
        let cli = base_cli();
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.channels.list, vec!["c1".to_string()]);
        assert_eq!(config.llm.provider, LlmProvider::Auto);
    }

    #[test]
    fn missing_channels_is_fatal() {
        let cli = CliConfig::default();
        let err = AppConfig::load(&cli);
        assert!(err.is_err());
    }

    #[test]
    fn cli_provider_overrides_default() {
        let mut cli = base_cli();
        cli.llm_provider = Some(LlmProvider::Local);
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Local);
    }

    #[test]
    fn cli_no_monitoring_disables_announcements_monitoring() {
        let mut cli = base_cli();
        cli.no_monitoring = true;
        let config = AppConfig::load(&cli).unwrap();
        assert!(!config.announcements.monitoring.enabled);
    }

    #[test]
    fn llm_provider_gates_backend_enablement() {
        assert!(LlmProvider::Local.local_enabled());
        assert!(!LlmProvider::Local.cloud_enabled());
        assert!(LlmProvider::Auto.local_enabled());
        assert!(LlmProvider::Auto.cloud_enabled());
        assert!(!LlmProvider::Cloud.local_enabled());
    }
}
