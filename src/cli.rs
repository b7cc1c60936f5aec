//! Command-line interface definitions for the HR briefing pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be provided through an environment variable, which
//! is how schedulers usually pass credentials.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one pipeline run.
///
/// Values given here (or through their environment variables) take
/// precedence over the optional YAML config file.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment
/// ANTHROPIC_API_KEY=... KWORK_APP_KEY=... KWORK_TO_EMAIL=hr@example.com hr_briefing
///
/// # Defaults from a config file, overriding the model
/// hr_briefing -c ./config.yaml --model claude-sonnet-4-20250514
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model used for the summary
    #[arg(short, long, env = "ANTHROPIC_MODEL")]
    pub model: Option<String>,

    /// Maximum tokens the model may produce
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// KakaoWork bot app key
    #[arg(long, env = "KWORK_APP_KEY", hide_env_values = true)]
    pub kwork_app_key: Option<String>,

    /// Comma-separated KakaoWork recipient emails
    #[arg(long, env = "KWORK_TO_EMAIL")]
    pub kwork_to_email: Option<String>,

    /// Conversation used when no email recipient can be reached
    #[arg(long, env = "KWORK_CONVERSATION_ID")]
    pub kwork_conversation_id: Option<String>,
}
