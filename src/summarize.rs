//! Briefing summaries generated from filtered articles.
//!
//! [`Summarizer`] turns the filtered batch into one prompt, sends it through
//! any [`AskAsync`] backend and strips markdown from the reply so it reads
//! cleanly in a chat message.

use crate::api::AskAsync;
use crate::models::FilteredArticle;
use crate::utils::{kst, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use tracing::{debug, error, info, instrument};

/// Returned without calling the model when nothing passed the filter.
pub const EMPTY_DIGEST: &str = "오늘 전달할 HR/페이롤 관련 기사가 확인되지 않았습니다.";

/// Used when the model answers with no text at all.
pub const EMPTY_RESPONSE: &str = "요약 생성에 실패했습니다.";

pub const SYSTEM_PROMPT: &str = "당신은 한국어로 HR/노무 실무 담당자를 위한 요약을 작성하는 전문가입니다. 날짜와 수치를 정확히 유지하세요.";

const PROMPT_HEADER: &str = "역할: 한국 HR/세무/노무 담당자에게 보내는 실무 브리핑 작성자
요구사항:
- 법/제도 변경, 정부 발표, 판결/행정해석, 실무 영향 강조
- 급여/원천/4대보험/연말정산 관련 정량 정보(금액/날짜/대상) 보존
- 각 항목은 5~7줄 이내로 요약하고, 핵심 bullet 1~2개 포함
- 각 항목마다 '왜 중요한지' 한 줄 포함
- 사이트/섹션/제목을 명확히 구분하여 표기
- 불필요한 수식어를 제거하고 간결하게 작성
- 마크다운 문법 사용 금지 (**, *, #, -, [] 등 사용하지 말 것)
- 일반 텍스트로만 작성
- 출력은 한국어
";

const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

fn format_article(article: &FilteredArticle, index: usize) -> String {
    let a = &article.article;
    let published = a.published_at.with_timezone(&kst()).format("%Y-%m-%d %H:%M");
    let tags = if article.tags.is_empty() {
        "태그 없음".to_string()
    } else {
        article.tags.join(", ")
    };

    [
        format!("기사 {}", index + 1),
        format!("사이트: {}", a.site),
        format!("섹션: {}", a.section.as_deref().unwrap_or("미지정")),
        format!("제목: {}", a.title),
        format!("발행: {published}"),
        format!("키워드: {tags}"),
        format!("본문: {}", a.content),
    ]
    .join("\n")
}

pub fn build_prompt(articles: &[FilteredArticle]) -> String {
    let body = articles
        .iter()
        .enumerate()
        .map(|(i, article)| format_article(article, i))
        .collect::<Vec<_>>()
        .join(ARTICLE_SEPARATOR);

    format!("{PROMPT_HEADER}\n기사 목록:\n{body}")
}

/// Ordered rewrite rules applied by [`remove_markdown`].
static MARKDOWN_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\*\*(.*?)\*\*", "$1"),
        (r"__(.*?)__", "$1"),
        (r"\*(.*?)\*", "$1"),
        (r"_(.*?)_", "$1"),
        (r"(?m)^#{1,6}\s+", ""),
        (r"(?m)^\s*[-*+]\s+", "• "),
        (r"\[([^\]]+)\]\([^)]+\)", "$1"),
        (r"`([^`]+)`", "$1"),
        (r"```[\s\S]*?```", ""),
        (r"(?m)^>\s*", ""),
        (r"(?m)^---+$", ""),
        (r"\n\s*\n\s*\n", "\n\n"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// Strip markdown syntax from model output.
pub fn remove_markdown(text: &str) -> String {
    MARKDOWN_RULES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
        .trim()
        .to_string()
}

/// Produces the briefing text for a filtered batch.
#[derive(Debug)]
pub struct Summarizer<A> {
    backend: A,
}

impl<A> Summarizer<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(backend: A) -> Self {
        Self { backend }
    }

    /// Summarize the batch. An empty batch never reaches the model.
    #[instrument(level = "info", skip_all, fields(articles = articles.len()))]
    pub async fn summarize(&self, articles: &[FilteredArticle]) -> Result<String, Box<dyn Error>> {
        if articles.is_empty() {
            info!("No articles to summarize");
            return Ok(EMPTY_DIGEST.to_string());
        }

        let prompt = build_prompt(articles);
        debug!(chars = prompt.chars().count(), "Built prompt");

        let response = match self.backend.ask(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Summarization failed");
                return Err(e);
            }
        };
        debug!(preview = %truncate_for_log(&response, 300), "Model response");

        if response.trim().is_empty() {
            return Ok(EMPTY_RESPONSE.to_string());
        }
        Ok(remove_markdown(&response))
    }
}
