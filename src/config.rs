//! Run configuration.
//!
//! Settings come from the command line (and its environment variables) with
//! an optional YAML file underneath for non-secret defaults. Credentials are
//! only checked when the collaborator that needs them is built.

use crate::api::{AnthropicClient, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, RetryAsk};
use crate::cli::Cli;
use crate::delivery::{DeliveryError, KakaoWorkClient, Notifier, parse_recipients};
use crate::summarize::{SYSTEM_PROMPT, Summarizer};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Retries after the first failed model call.
pub const SUMMARY_MAX_RETRIES: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("failed to build client: {0}")]
    Client(String),
}

impl From<DeliveryError> for ConfigError {
    fn from(e: DeliveryError) -> Self {
        ConfigError::Client(e.to_string())
    }
}

/// Optional `config.yaml` contents.
///
/// ```yaml
/// model: claude-sonnet-4-20250514
/// max_tokens: 1200
/// recipients:
///   - hr@example.com
/// conversation_id: "123456"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub recipients: Vec<String>,
    pub conversation_id: Option<String>,
}

pub fn parse_config(yaml: &str) -> Result<FileConfig, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&yaml)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Effective settings for one run.
#[derive(Clone, PartialEq)]
pub struct Settings {
    pub anthropic_api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub kwork_app_key: Option<String>,
    pub recipients: Vec<String>,
    pub conversation_id: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("kwork_app_key", &self.kwork_app_key.as_ref().map(|_| "***"))
            .field("recipients", &self.recipients)
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    /// Merge CLI values over file values over built-in defaults.
    pub fn resolve(cli: Cli, file: FileConfig) -> Self {
        let recipients = match non_empty(cli.kwork_to_email) {
            Some(raw) => parse_recipients(&raw),
            None => file
                .recipients
                .iter()
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty())
                .collect(),
        };

        Self {
            anthropic_api_key: non_empty(cli.anthropic_api_key),
            model: non_empty(cli.model)
                .or(non_empty(file.model))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: cli
                .max_tokens
                .or(file.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            kwork_app_key: non_empty(cli.kwork_app_key),
            recipients,
            conversation_id: non_empty(cli.kwork_conversation_id).or(non_empty(file.conversation_id)),
        }
    }

    /// Read the config file named on the command line, if any, and merge.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => load_config(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(cli, file))
    }

    pub fn summarizer(&self) -> Result<Summarizer<RetryAsk<AnthropicClient>>, ConfigError> {
        let api_key = self
            .anthropic_api_key
            .clone()
            .ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?;
        let client = AnthropicClient::new(
            api_key,
            self.model.clone(),
            self.max_tokens,
            SYSTEM_PROMPT.to_string(),
        )
        .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Summarizer::new(RetryAsk::new(
            client,
            SUMMARY_MAX_RETRIES,
            Duration::from_secs(1),
        )))
    }

    pub fn notifier(&self) -> Result<Notifier<KakaoWorkClient>, ConfigError> {
        let app_key = self
            .kwork_app_key
            .clone()
            .ok_or(ConfigError::Missing("KWORK_APP_KEY"))?;
        if self.recipients.is_empty() {
            return Err(ConfigError::Missing("KWORK_TO_EMAIL"));
        }
        Ok(Notifier::new(
            KakaoWorkClient::new(app_key)?,
            self.recipients.clone(),
            self.conversation_id.clone(),
        ))
    }
}
