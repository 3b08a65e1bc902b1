// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "SynapseBot";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "synapse-bot";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".synapse-bot";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "synapse-bot.toml";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SYNAPSE_BOT_CONFIG";

// =============================================================================
// Environment Variables - Debug / Logging
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "SYNAPSE_BOT_DEBUG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SYNAPSE_BOT_LOG";

/// Default tracing-subscriber env-filter when neither `ENV_LOG` nor `RUST_LOG` is set
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Bot Identity (bot.*)
// =============================================================================

pub const ENV_BOT_NAME: &str = "SYNAPSE_BOT_NAME";
pub const DEFAULT_BOT_NAME: &str = "synapsebot";
pub const DEFAULT_BOT_PERSONALITY: &str = "a helpful, slightly irreverent Twitch chat companion";

// =============================================================================
// Channels (channels.*)
// =============================================================================

/// Comma-separated channel list, CLI/env override for `[channels] list`
pub const ENV_CHANNELS: &str = "SYNAPSE_BOT_CHANNELS";

// =============================================================================
// LLM Provider Gating (llm.*)
// =============================================================================

pub const ENV_LLM_PROVIDER: &str = "SYNAPSE_BOT_LLM_PROVIDER";

/// One of {local, cloud, auto} — gates which backends report `can_execute`
pub const DEFAULT_LLM_PROVIDER: &str = "auto";

pub const DEFAULT_MODEL_ENDPOINT: &str = "http://127.0.0.1:1234/v1/chat/completions";
pub const DEFAULT_MODEL_NAME: &str = "local-model";
pub const DEFAULT_LANGUAGE: &str = "en";

// =============================================================================
// Secrets (apis.openai_key)
// =============================================================================

/// Env var consulted before the config file for the cloud backend credential
pub const ENV_SECRET_OPENAI_KEY: &str = "SYNAPSE_BOT_OPENAI_KEY";

/// Filename for the file-based secret fallback, relative to the data dir
pub const SECRET_FILE_NAME: &str = "secrets.json";

pub const SECRET_KEY_OPENAI: &str = "apis.openai_key";

// =============================================================================
// Read-only REST Collaborator (apis.timeout)
// =============================================================================

pub const DEFAULT_REST_TIMEOUT_SECS: u64 = 8;

// =============================================================================
// Inference Defaults (llm.inference.*) — request shaping per (context, class)
// =============================================================================

pub const DEFAULT_MAX_TOKENS_ASK: u32 = 200;
pub const DEFAULT_MAX_TOKENS_MENTION_LONG: u32 = 100;
pub const DEFAULT_MAX_TOKENS_MENTION_SHORT: u32 = 200;
pub const DEFAULT_MAX_TOKENS_OTHER_LONG: u32 = 100;
pub const DEFAULT_MAX_TOKENS_OTHER: u32 = 150;

pub const DEFAULT_TEMPERATURE_ASK: f32 = 0.3;
pub const DEFAULT_TEMPERATURE_MENTION_LONG: f32 = 0.4;
pub const DEFAULT_TEMPERATURE_MENTION_SHORT: f32 = 0.7;
pub const DEFAULT_TEMPERATURE_OTHER_LONG: f32 = 0.4;
pub const DEFAULT_TEMPERATURE_OTHER: f32 = 0.7;

pub const DEFAULT_REPEAT_PENALTY_LONG: f32 = 1.2;
pub const DEFAULT_REPEAT_PENALTY_SHORT: f32 = 1.1;

// Cloud backend tiers, §4.4
pub const DEFAULT_CLOUD_MAX_TOKENS_SHORT: u32 = 90;
pub const DEFAULT_CLOUD_MAX_TOKENS_LONG: u32 = 60;
pub const DEFAULT_CLOUD_TEMPERATURE_ASK: f32 = 0.4;
pub const DEFAULT_CLOUD_TEMPERATURE_MENTION: f32 = 0.8;

// =============================================================================
// Post-processing (LocalBackend / CloudBackend)
// =============================================================================

pub const GEN_LONG_MAX_CHARS: usize = 400;
pub const ASK_MAX_CHARS: usize = 250;
pub const MIN_VALID_RESPONSE_LEN: usize = 3;

/// Sentence-ending marker appended to prompts so the model has an explicit stop token
pub const END_MARKER: &str = "[END]";

pub const DEFAULT_DRIFT_PHRASES: &[&str] = &[
    "in summary",
    "furthermore",
    "it is interesting to note",
    "to conclude",
    "in conclusion",
];

pub const DEFAULT_TRIVIAL_RESPONSES: &[&str] = &["yes", "no", "ok"];

// =============================================================================
// Neural Dispatcher (neural_llm.*)
// =============================================================================

pub const DEFAULT_UCB_EXPLORATION_FACTOR: f64 = 1.4;
pub const DEFAULT_MIN_TRIALS_PER_SYNAPSE: u64 = 3;
pub const DEFAULT_EMA_ALPHA_LOCAL: f64 = 0.1;
pub const DEFAULT_EMA_ALPHA_CLOUD: f64 = 0.2;

pub const DEFAULT_LOCAL_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCAL_RECOVERY_SECS: u64 = 30;
pub const DEFAULT_CLOUD_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CLOUD_RECOVERY_SECS: u64 = 60;

pub const DEFAULT_TIMEOUT_CONNECT_SECS: u64 = 5;
pub const DEFAULT_TIMEOUT_INFERENCE_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_WRITE_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_POOL_SECS: u64 = 5;

pub const DEFAULT_REWARD_LATENCY_TARGET_SECS: f64 = 1.0;
pub const DEFAULT_REWARD_LATENCY_WEIGHT: f64 = 0.3;
pub const DEFAULT_REWARD_LENGTH_BONUS: f64 = 0.2;
pub const DEFAULT_REWARD_PUNCTUATION_BONUS: f64 = 0.1;
pub const DEFAULT_REWARD_EMOJI_BONUS: f64 = 0.15;
pub const REWARD_FLOOR: f64 = 0.1;
pub const QUALITY_LENGTH_THRESHOLD: usize = 20;

pub const CLOUD_REWARD_LATENCY_TARGET_SECS: f64 = 2.0;

pub const CLOUD_BACKOFF_BASE_SECS: f64 = 1.0;
pub const CLOUD_BACKOFF_CAP_SECS: f64 = 60.0;

/// Size of the bounded correlation-record archive ring
pub const CORRELATION_RING_SIZE: usize = 100;

/// Window used by the dispatcher's recent-success-rate aggregate
pub const RECENT_WINDOW_MINUTES: i64 = 5;

// =============================================================================
// Classifier
// =============================================================================

pub const CLASSIFIER_CACHE_SIZE: usize = 256;
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 1.9;
pub const DEFAULT_SAFE_CLASS: &str = "gen_short";

pub const DEFAULT_PING_PATTERNS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "yo",
    "sup",
    "howdy",
    "good morning",
    "good evening",
    "morning",
    "evening",
    "thanks",
    "thank you",
    "ty",
    "lol",
    "lmao",
    "gg",
    "o/",
    "o7",
];

pub const LONG_FORM_COMMAND_TOKEN: &str = "!ask";

// =============================================================================
// ResponseCache (commands.cache.*)
// =============================================================================

pub const DEFAULT_JOKE_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_JOKE_CACHE_MAX_SIZE: usize = 100;
pub const CACHE_EVICTION_FRACTION: f64 = 0.2;
pub const CACHE_SESSION_ROTATION_REQUESTS: u64 = 3;

/// Fixed style-hint set appended by `ResponseCache::get_dynamic_prompt`
pub const DYNAMIC_PROMPT_STYLE_HINTS: &[&str] = &[
    "in a funny style",
    "in an absurd style",
    "short style",
    "for kids",
    "for adults",
    "with a pun",
    "surprise me",
];

// =============================================================================
// Commands (commands.cooldowns.*)
// =============================================================================

pub const DEFAULT_COOLDOWN_ASK_SECS: u64 = 15;
pub const DEFAULT_COOLDOWN_JOKE_SECS: u64 = 15;
pub const DEFAULT_COOLDOWN_MENTION_SECS: u64 = 15;

pub const DEFAULT_COMMAND_PREFIX: char = '!';
pub const MAX_REPLY_LEN: usize = 500;
pub const DEDUP_SET_SIZE: usize = 100;

// =============================================================================
// Reflex pools
// =============================================================================

pub const REFLEX_RECENT_WINDOW: usize = 5;
pub const REFLEX_SIMULATED_REWARD: f64 = 0.5;

// =============================================================================
// Announcements (announcements.*)
// =============================================================================

pub const ANNOUNCE_MAX_CHARS: usize = 500;
pub const DEFAULT_ANNOUNCE_TITLE: &str = "Untitled";
pub const DEFAULT_ANNOUNCE_GAME: &str = "Unknown category";
pub const DEFAULT_ONLINE_TEMPLATE: &str = "🔴 @{channel} is live — {title} ({game_name})";
pub const DEFAULT_OFFLINE_TEMPLATE: &str = "@{channel} has gone offline.";

/// Used when template formatting itself fails
pub const FALLBACK_ONLINE_MESSAGE: &str = "@channel is now live!";

// =============================================================================
// Monitoring (announcements.monitoring.*)
// =============================================================================

pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 60;
pub const EVENTSUB_LIVENESS_CHECK_SECS: u64 = 60;
pub const EVENTSUB_SUBSCRIBE_RETRY_BASE_SECS: u64 = 30;
pub const EVENTSUB_SUBSCRIBE_RETRY_CAP_SECS: u64 = 300;
pub const EVENTSUB_SUBSCRIBE_MAX_ATTEMPTS: u32 = 3;
pub const EVENTSUB_RECONNECT_BASE_SECS: u64 = 10;
pub const EVENTSUB_RECONNECT_MAX_ATTEMPTS: u32 = 5;

// =============================================================================
// Shutdown
// =============================================================================

/// Grace period awaited before a shutdown forcibly drops still-running tasks
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
