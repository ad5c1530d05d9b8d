use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SlackError};

pub const CONFIG_FILE_NAME: &str = "slack.config.json";
pub const EMOJI_FILE_NAME: &str = "slack.emoji.json";
pub const CONFIG_DIR_ENV: &str = "SLACK_CLI_CONFIG_DIR";
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub slack_bot_token: String,
    pub slack_user_token: String,
    pub channel_id: String,
    pub server_bot_user_id: String,

    #[serde(default)]
    pub user_cache: HashMap<String, String>,

    #[serde(default = "default_show_limit")]
    pub default_show_limit: usize,

    #[serde(default)]
    pub default_emoji: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    // No timeout unless set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(skip)]
    pub path: PathBuf,
}

fn default_show_limit() -> usize {
    20
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// Outcome of looking for the config file at startup.
#[derive(Debug)]
pub enum ConfigLoad {
    Loaded(Config),
    /// A template was written and needs editing before the CLI is usable.
    Created(PathBuf),
}

impl Config {
    /// Load the config from `dir`, writing a template there on first run.
    pub fn load_or_create(dir: &Path) -> Result<ConfigLoad> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            let config = Self::template(path.clone());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    SlackError::Config(format!("could not create {}: {e}", parent.display()))
                })?;
            }
            config.save()?;
            return Ok(ConfigLoad::Created(path));
        }
        Self::load(&path).map(ConfigLoad::Loaded)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SlackError::Config(format!("could not open config file {}: {e}", path.display()))
        })?;
        let mut config: Config = serde_json::from_str(&content).map_err(|e| {
            SlackError::Config(format!("could not decode config JSON {}: {e}", path.display()))
        })?;
        config.path = path.to_path_buf();
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(&self.path, content).map_err(|e| {
            SlackError::Config(format!("could not write config file {}: {e}", self.path.display()))
        })?;
        Ok(())
    }

    fn template(path: PathBuf) -> Self {
        let mut user_cache = HashMap::new();
        user_cache.insert("U075JAXRYV7".to_string(), "Bot".to_string());
        Self {
            slack_bot_token: "your_slack_bot_token".to_string(),
            slack_user_token: "your_slack_user_token".to_string(),
            channel_id: "your_channel_id".to_string(),
            server_bot_user_id: "your_server_bot_user_id".to_string(),
            user_cache,
            default_show_limit: default_show_limit(),
            default_emoji: "white-check-mark".to_string(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: None,
            path,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn emoji_path(&self) -> PathBuf {
        self.path
            .parent()
            .map(|dir| dir.join(EMOJI_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(EMOJI_FILE_NAME))
    }
}

/// Directory holding the config and emoji files.
///
/// Explicit flag first, then `SLACK_CLI_CONFIG_DIR`, then the working directory.
pub fn get_config_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(current_dir) = std::env::current_dir() {
        return current_dir;
    }
    dirs::config_dir()
        .map(|dir| dir.join("slack_cli_rs"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config pointed at a local API, for exercising the HTTP client.
#[cfg(test)]
pub(crate) fn test_config(api_base_url: &str) -> Config {
    let mut config = Config::template(PathBuf::from(CONFIG_FILE_NAME));
    config.slack_bot_token = "xoxb-test".to_string();
    config.slack_user_token = "xoxp-test".to_string();
    config.channel_id = "C1".to_string();
    config.api_base_url = api_base_url.trim_end_matches('/').to_string();
    config
}
