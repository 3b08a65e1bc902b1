//! Minimal secret resolution for backend credentials (spec §6
//! `apis.openai_key`).
//!
//! Grounded on the teacher's `SecretManager`/`SecretVault` file-backend
//! path (`load_vault_from_file`/`save_vault_to_file`), trimmed to the
//! one credential this bot needs: no OS keychain integration, no JWT or
//! HMAC signing keys, since nothing in this domain issues its own
//! tokens. Resolution order, highest precedence first: the
//! `SYNAPSE_BOT_OPENAI_KEY` env var, the secrets file, then
//! `apis.openai_key` in the config file.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::config::AppConfig;
use super::constants::{APP_DOT_FOLDER, ENV_SECRET_OPENAI_KEY, SECRET_FILE_NAME, SECRET_KEY_OPENAI};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SecretFile {
    #[serde(flatten)]
    entries: HashMap<String, String>,
}

fn secrets_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(SECRET_FILE_NAME))
}

fn read_secrets_file(path: &std::path::Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secrets file: {}", path.display()))?;
    let file: SecretFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse secrets file: {}", path.display()))?;
    Ok(file.entries)
}

/// First non-empty value wins: env, then secrets-file, then the config
/// file's own fallback.
fn resolve(env: Option<String>, from_file: Option<String>, config_fallback: Option<String>) -> Option<String> {
    [env, from_file, config_fallback]
        .into_iter()
        .find_map(|v| v.filter(|s| !s.trim().is_empty()))
}

/// Resolves credentials for external backends (spec §6). Currently holds
/// only the OpenAI-compatible cloud API key.
#[derive(Debug, Clone)]
pub struct SecretManager {
    entries: HashMap<String, String>,
}

impl SecretManager {
    pub fn load(config: &AppConfig) -> Result<Self> {
        let file_entries = match secrets_file_path() {
            Some(path) => read_secrets_file(&path)?,
            None => HashMap::new(),
        };

        let env_value = std::env::var(ENV_SECRET_OPENAI_KEY).ok();
        let file_value = file_entries.get(SECRET_KEY_OPENAI).cloned();
        let config_value = config.apis.openai_key.clone();

        let mut entries = HashMap::new();
        if let Some(resolved) = resolve(env_value, file_value, config_value) {
            entries.insert(SECRET_KEY_OPENAI.to_string(), resolved);
        }

        Ok(Self { entries })
    }

    pub fn openai_key(&self) -> Option<&str> {
        self.entries.get(SECRET_KEY_OPENAI).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Delete the on-disk secrets file, used by `system prune` (spec §6
    /// `System::Prune`).
    pub fn prune() -> Result<()> {
        if let Some(path) = secrets_file_path() {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to remove secrets file: {}", path.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_over_file_and_config() {
        let resolved = resolve(
            Some("from-env".to_string()),
            Some("from-file".to_string()),
            Some("from-config".to_string()),
        );
        assert_eq!(resolved, Some("from-env".to_string()));
    }

    #[test]
    fn file_wins_over_config_when_env_absent() {
        let resolved = resolve(None, Some("from-file".to_string()), Some("from-config".to_string()));
        assert_eq!(resolved, Some("from-file".to_string()));
    }

    #[test]
    fn config_fallback_used_when_others_absent() {
        let resolved = resolve(None, None, Some("from-config".to_string()));
        assert_eq!(resolved, Some("from-config".to_string()));
    }

    #[test]
    fn empty_values_are_skipped() {
        let resolved = resolve(Some("  ".to_string()), None, Some("from-config".to_string()));
        assert_eq!(resolved, Some("from-config".to_string()));
    }

    #[test]
    fn none_resolved_when_all_absent() {
        assert_eq!(resolve(None, None, None), None);
    }
}
