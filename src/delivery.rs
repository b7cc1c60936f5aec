//! Briefing delivery over KakaoWork.
//!
//! A briefing is rendered into one message, split into chunks that fit the
//! messenger's size limit and sent to every configured email. A chunk that
//! reaches no recipient at all is re-sent to the fallback conversation.

use crate::models::FilteredArticle;
use crate::scrapers::DEFAULT_SECTION;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub const KAKAOWORK_API_BASE: &str = "https://api.kakaowork.com/v1";

/// Largest chunk, in characters, sent as one message.
pub const MAX_CHUNK_LEN: usize = 4000;

pub const FAILURE_ALERT_TITLE: &str = "🚨 파이프라인 실패 알림";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("kakaowork rejected the message: {0}")]
    Rejected(String),
    #[error("every email delivery failed and no fallback conversation is configured")]
    NoFallback,
}

/// Transport for a single message.
pub trait MessageChannel {
    async fn send_by_email(&self, email: &str, text: &str) -> Result<(), DeliveryError>;

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError>;
}

impl<T: MessageChannel> MessageChannel for &T {
    async fn send_by_email(&self, email: &str, text: &str) -> Result<(), DeliveryError> {
        (**self).send_by_email(email, text).await
    }

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        (**self).send_to_conversation(conversation_id, text).await
    }
}

#[derive(Debug, Serialize)]
struct EmailMessage<'a> {
    email: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ConversationMessage<'a> {
    conversation_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn default_success() -> bool {
    true
}

/// KakaoWork bot client authenticated with an app key.
pub struct KakaoWorkClient {
    http: reqwest::Client,
    app_key: String,
    base_url: String,
}

impl KakaoWorkClient {
    pub fn new(app_key: String) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            app_key,
            base_url: KAKAOWORK_API_BASE.to_string(),
        })
    }

    async fn post<B: Serialize>(&self, method: &str, body: &B) -> Result<(), DeliveryError> {
        let response: ApiResponse = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(&self.app_key)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.success {
            return Ok(());
        }
        let reason = response
            .error
            .map(|e| format!("{} {}", e.code, e.message))
            .unwrap_or_else(|| "unknown error".to_string());
        Err(DeliveryError::Rejected(reason))
    }
}

impl fmt::Debug for KakaoWorkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KakaoWorkClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MessageChannel for KakaoWorkClient {
    async fn send_by_email(&self, email: &str, text: &str) -> Result<(), DeliveryError> {
        self.post("messages.send_by_email", &EmailMessage { email, text })
            .await
    }

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.post(
            "messages.send",
            &ConversationMessage {
                conversation_id,
                text,
            },
        )
        .await
    }
}

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pack lines into chunks of at most [`MAX_CHUNK_LEN`] characters.
///
/// Lines are never split. A line longer than the limit becomes a chunk of
/// its own.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut length = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count() + 1;
        if length + line_len > MAX_CHUNK_LEN && !buffer.is_empty() {
            chunks.push(buffer.join("\n"));
            buffer.clear();
            length = 0;
        }
        buffer.push(line);
        length += line_len;
    }

    if !buffer.is_empty() {
        chunks.push(buffer.join("\n"));
    }
    chunks
}

/// `원문 링크` followed by one line per article, or empty when there are none.
pub fn build_link_digest(articles: &[FilteredArticle]) -> String {
    if articles.is_empty() {
        return String::new();
    }
    std::iter::once("원문 링크".to_string())
        .chain(articles.iter().map(|f| {
            let a = &f.article;
            format!(
                "- {} | {} | [{}]({})",
                a.site,
                a.section.as_deref().unwrap_or(DEFAULT_SECTION),
                a.title,
                a.url
            )
        }))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Header, summary and link digest joined by blank lines.
pub fn build_message(summary: &str, articles: &[FilteredArticle], date: NaiveDate) -> String {
    let header = format!("{} HR/페이롤 아침 브리핑", date.format("%Y-%m-%d"));
    let digest = build_link_digest(articles);
    [header.as_str(), summary, digest.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Sends briefings to a fixed set of recipients.
#[derive(Debug)]
pub struct Notifier<C> {
    channel: C,
    emails: Vec<String>,
    conversation_id: Option<String>,
}

impl<C: MessageChannel> Notifier<C> {
    pub fn new(channel: C, emails: Vec<String>, conversation_id: Option<String>) -> Self {
        Self {
            channel,
            emails,
            conversation_id,
        }
    }

    /// Render and send a briefing dated `date`.
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), date = %date))]
    pub async fn deliver(
        &self,
        summary: &str,
        articles: &[FilteredArticle],
        date: NaiveDate,
    ) -> Result<(), DeliveryError> {
        let message = build_message(summary, articles, date);
        let chunks = chunk_text(&message);
        info!(chunks = chunks.len(), recipients = self.emails.len(), "Delivering briefing");

        for (index, chunk) in chunks.iter().enumerate() {
            self.deliver_chunk(index, chunk).await?;
        }
        Ok(())
    }

    async fn deliver_chunk(&self, index: usize, chunk: &str) -> Result<(), DeliveryError> {
        let mut delivered = 0usize;
        for email in &self.emails {
            match self.channel.send_by_email(email, chunk).await {
                Ok(()) => {
                    delivered += 1;
                    info!(chunk = index, %email, "Email delivery succeeded");
                }
                Err(e) => warn!(chunk = index, %email, error = %e, "Email delivery failed"),
            }
        }

        if delivered > 0 {
            return Ok(());
        }

        let Some(conversation_id) = self.conversation_id.as_deref() else {
            error!(chunk = index, "No fallback conversation configured");
            return Err(DeliveryError::NoFallback);
        };
        match self.channel.send_to_conversation(conversation_id, chunk).await {
            Ok(()) => {
                info!(chunk = index, conversation_id, "Fallback delivery succeeded");
                Ok(())
            }
            Err(e) => {
                error!(chunk = index, conversation_id, error = %e, "Fallback delivery failed");
                Err(e)
            }
        }
    }

    /// Send a failure report as a briefing with no articles.
    pub async fn alert(&self, report: &str, date: NaiveDate) -> Result<(), DeliveryError> {
        let text = format!("{FAILURE_ALERT_TITLE}\n\n{report}");
        self.deliver(&text, &[], date).await
    }
}
