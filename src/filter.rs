//! Relevance filtering for scraped articles.
//!
//! [`filter_articles`] reduces a scraped batch in four stages:
//!
//! 1. **Validation**: drop articles with a blank title or body, or a URL
//!    that is not absolute
//! 2. **Dedup**: keep the first article per URL with its fragment removed
//! 3. **Classification**: drop anything matching an exclude keyword, then
//!    keep only articles matching at least one include keyword
//! 4. **Tagging**: attach every include keyword the article matched
//!
//! Output order is the order articles were first seen.

use crate::models::{FilteredArticle, ScrapedArticle};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// HR, payroll and labor-law vocabulary that makes an article relevant.
pub const INCLUDE_KEYWORDS: &[&str] = &[
    "휴가",
    "채용",
    "임금",
    "최저임금",
    "통상임금",
    "4대보험",
    "국민연금",
    "건강보험",
    "고용보험",
    "산재보험",
    "원천세",
    "연말정산",
    "소득세",
    "퇴직",
    "근로계약",
    "근로시간",
    "연차",
    "탄력근로",
    "모성보호",
    "출산휴가",
    "육아휴직",
    "산재",
    "노조",
    "단체교섭",
    "해고",
    "징계",
    "근로자",
    "HR",
    "페이롤",
    "세액",
    "공제",
    "상여",
    "수당",
    "복리후생",
    "주52",
    "주 52",
    "노사",
    "법령",
    "행정해석",
];

/// Promotional terms. A match drops the article whatever else it contains.
pub const EXCLUDE_KEYWORDS: &[&str] = &["광고", "이벤트", "쿠폰", "구독", "후기", "상생페이백"];

fn compile(keywords: &[&str]) -> Vec<Regex> {
    keywords
        .iter()
        .map(|kw| Regex::new(&format!("(?i){}", regex::escape(kw))).unwrap())
        .collect()
}

static INCLUDE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| compile(INCLUDE_KEYWORDS));

static EXCLUDE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| compile(EXCLUDE_KEYWORDS));

/// Why an article failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalid {
    EmptyTitle,
    BadUrl(String),
    EmptyContent,
}

/// Check the shape of a scraped article.
///
/// The site and timestamp are guaranteed by their types.
pub fn validate(article: &ScrapedArticle) -> Result<(), Invalid> {
    if article.title.trim().is_empty() {
        return Err(Invalid::EmptyTitle);
    }
    match Url::parse(&article.url) {
        Ok(url) if url.has_host() => {}
        Ok(_) => return Err(Invalid::BadUrl("missing host".to_string())),
        Err(e) => return Err(Invalid::BadUrl(e.to_string())),
    }
    if article.content.trim().is_empty() {
        return Err(Invalid::EmptyContent);
    }
    Ok(())
}

/// Identity used for dedup: the URL without its `#fragment`.
pub fn dedup_key(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

pub fn matches_exclude(haystack: &str) -> bool {
    EXCLUDE_PATTERNS.iter().any(|re| re.is_match(haystack))
}

pub fn matches_include(haystack: &str) -> bool {
    INCLUDE_PATTERNS.iter().any(|re| re.is_match(haystack))
}

/// Include keywords found in `haystack`, in keyword-table order.
pub fn find_tags(haystack: &str) -> Vec<String> {
    INCLUDE_PATTERNS
        .iter()
        .zip(INCLUDE_KEYWORDS)
        .filter(|(re, _)| re.is_match(haystack))
        .map(|(_, kw)| kw.to_string())
        .unique()
        .collect()
}

/// Validate, dedup, classify and tag a batch of scraped articles.
#[instrument(level = "info", skip_all, fields(total = articles.len()))]
pub fn filter_articles(articles: Vec<ScrapedArticle>) -> Vec<FilteredArticle> {
    info!("Filtering started");

    let validated: Vec<ScrapedArticle> = articles
        .into_iter()
        .filter(|article| match validate(article) {
            Ok(()) => true,
            Err(reason) => {
                warn!(url = %article.url, ?reason, "Invalid article skipped");
                false
            }
        })
        .collect();
    info!(validated = validated.len(), "Validation complete");

    let mut seen = HashSet::new();
    let unique: Vec<ScrapedArticle> = validated
        .into_iter()
        .filter(|article| {
            let fresh = seen.insert(dedup_key(&article.url).to_string());
            if !fresh {
                debug!(url = %article.url, "Duplicate article dropped");
            }
            fresh
        })
        .collect();
    info!(unique = unique.len(), "Dedup complete");

    let filtered: Vec<FilteredArticle> = unique
        .into_iter()
        .filter_map(|article| {
            let haystack = article.haystack();
            if matches_exclude(&haystack) {
                debug!(title = %article.title, "Excluded by promotional keyword");
                return None;
            }
            if !matches_include(&haystack) {
                return None;
            }
            let tags = find_tags(&haystack);
            Some(FilteredArticle { article, tags })
        })
        .collect();
    info!(filtered = filtered.len(), "Keyword filtering complete");

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Site;
    use chrono::Utc;

    fn base_article() -> ScrapedArticle {
        ScrapedArticle {
            title: "테스트 기사".to_string(),
            url: "https://example.com/article".to_string(),
            published_at: Utc::now(),
            section: Some("테스트".to_string()),
            site: Site::Kacta,
            content: "본문 텍스트".to_string(),
        }
    }

    fn with(title: &str, content: &str, url: &str) -> ScrapedArticle {
        ScrapedArticle {
            title: title.to_string(),
            content: content.to_string(),
            url: url.to_string(),
            ..base_article()
        }
    }

    #[test]
    fn test_includes_article_when_keyword_matches() {
        let articles = vec![with(
            "최저임금 조정 발표",
            "정부가 최저임금 변경을 발표했다.",
            "https://example.com/article",
        )];
        let result = filter_articles(articles);
        assert_eq!(result.len(), 1);
        assert!(result[0].tags.contains(&"최저임금".to_string()));
        // "임금" is a substring of "최저임금" and is listed first
        assert_eq!(result[0].tags, vec!["임금".to_string(), "최저임금".to_string()]);
    }

    #[test]
    fn test_excludes_article_when_keyword_absent() {
        assert!(filter_articles(vec![base_article()]).is_empty());
    }

    #[test]
    fn test_excludes_article_when_blacklist_matches() {
        let articles = vec![with(
            "최저임금 광고",
            "광고 이벤트 안내",
            "https://example.com/article",
        )];
        assert!(filter_articles(articles).is_empty());
    }

    #[test]
    fn test_exclude_wins_over_many_includes() {
        let articles = vec![with(
            "연말정산 원천세 4대보험 총정리",
            "상생페이백 참여 시 국민연금 공제 혜택",
            "https://example.com/article",
        )];
        assert!(filter_articles(articles).is_empty());
    }

    #[test]
    fn test_fragment_duplicates_keep_first_seen() {
        let articles = vec![
            with("육아휴직 확대", "첫 번째", "https://x.example/a#top"),
            with("육아휴직 확대 (재게시)", "두 번째", "https://x.example/a#bottom"),
        ];
        let result = filter_articles(articles);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].article.url, "https://x.example/a#top");
        assert_eq!(result[0].article.content, "첫 번째");
    }

    #[test]
    fn test_invalid_articles_are_dropped_before_dedup() {
        let articles = vec![
            with("해고 판결", "본문", "not a url"),
            with("", "해고 판결 본문", "https://x.example/b"),
            with("해고 판결", "   ", "https://x.example/c"),
            with("해고 판결", "대법원 판결", "https://x.example/b"),
        ];
        let result = filter_articles(articles);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].article.url, "https://x.example/b");
        assert_eq!(result[0].article.title, "해고 판결");
    }

    #[test]
    fn test_whitespace_only_fields_are_invalid() {
        let blank_title = with(" \n\t ", "해고 판결 본문", "https://x.example/e");
        let blank_content = with("해고 판결", "\n  \n", "https://x.example/f");
        assert_eq!(validate(&blank_title), Err(Invalid::EmptyTitle));
        assert_eq!(validate(&blank_content), Err(Invalid::EmptyContent));
        assert!(filter_articles(vec![blank_title, blank_content]).is_empty());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let articles = vec![with("hr 담당자 필독", "내용", "https://x.example/hr")];
        let result = filter_articles(articles);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tags, vec!["HR".to_string()]);
    }

    #[test]
    fn test_tags_only_contain_matching_terms_once() {
        let articles = vec![with(
            "육아휴직 급여 인상",
            "육아휴직 기간 중 통상임금 기준 수당 지급. 육아휴직 확대.",
            "https://x.example/d",
        )];
        let result = filter_articles(articles);
        assert_eq!(result.len(), 1);
        let tags = &result[0].tags;
        assert_eq!(tags.iter().unique().count(), tags.len());
        let haystack = result[0].article.haystack().to_lowercase();
        for tag in tags {
            assert!(haystack.contains(&tag.to_lowercase()), "{tag} not in article");
        }
        assert!(tags.contains(&"육아휴직".to_string()));
    }

    #[test]
    fn test_output_preserves_first_seen_order() {
        let articles = vec![
            with("노조 파업", "노사 협상 결렬", "https://x.example/1"),
            with("날씨 소식", "맑음", "https://x.example/2"),
            with("연차 사용 촉진", "근로자 연차", "https://x.example/3"),
        ];
        let urls: Vec<_> = filter_articles(articles)
            .into_iter()
            .map(|f| f.article.url)
            .collect();
        assert_eq!(urls, vec!["https://x.example/1", "https://x.example/3"]);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let articles = vec![
            with("노조 파업", "노사 협상 결렬", "https://x.example/1"),
            with("노조 파업", "노사 협상 결렬", "https://x.example/1#dup"),
            with("연차 사용 촉진", "근로자 연차", "https://x.example/3"),
        ];
        let once = filter_articles(articles);
        let again = filter_articles(once.iter().map(|f| f.article.clone()).collect());
        assert_eq!(once, again);
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_articles(Vec::new()).is_empty());
    }

    #[test]
    fn test_dedup_key_strips_fragment() {
        assert_eq!(dedup_key("https://x/a#top"), "https://x/a");
        assert_eq!(dedup_key("https://x/a"), "https://x/a");
    }
}
