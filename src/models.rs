//! Data models for scraped and filtered articles.
//!
//! Articles move through three shapes as the pipeline advances:
//! - [`ArticleMeta`]: what a list scraper learns from a site's homepage
//! - [`ScrapedArticle`]: the meta plus body text from the article page
//! - [`FilteredArticle`]: a scraped article that passed keyword filtering,
//!   carrying the include keywords it matched
//!
//! Field names serialize in camelCase so dumps line up with the digest and
//! prompt vocabulary (`publishedAt`, `site`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two news sites the pipeline scrapes.
///
/// Serialized as the site's Korean name. Any other label fails to parse,
/// so an article with an unknown site never reaches the filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Site {
    /// 세무사신문, the Korean Association of Certified Tax Accountants webzine.
    #[serde(rename = "세무사신문")]
    Kacta,
    /// 노무사신문, the labor attorneys' newspaper.
    #[serde(rename = "노무사신문")]
    Nomu,
}

impl Site {
    pub fn label(&self) -> &'static str {
        match self {
            Site::Kacta => "세무사신문",
            Site::Nomu => "노무사신문",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "세무사신문" => Ok(Site::Kacta),
            "노무사신문" => Ok(Site::Nomu),
            other => Err(format!("unknown site: {other}")),
        }
    }
}

/// Candidate article discovered on a site's homepage.
///
/// `published_at` starts out as the scrape time and is corrected once the
/// article page is fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMeta {
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub section: Option<String>,
    pub site: Site,
}

/// An article with its body text.
///
/// Content scrapers only produce this when the extracted body is at least
/// [`MIN_CONTENT_CHARS`](crate::scrapers::MIN_CONTENT_CHARS) characters long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedArticle {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub section: Option<String>,
    pub site: Site,
    pub content: String,
}

impl ScrapedArticle {
    pub fn from_meta(meta: &ArticleMeta, content: String, published_at: DateTime<Utc>) -> Self {
        Self {
            title: meta.title.clone(),
            url: meta.url.clone(),
            published_at,
            section: meta.section.clone(),
            site: meta.site,
            content,
        }
    }

    /// Text searched by the keyword rules: title and body separated by a newline.
    pub fn haystack(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }
}

/// A relevant article, tagged with the include keywords it matched.
///
/// Tags follow keyword-table order and never repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredArticle {
    #[serde(flatten)]
    pub article: ScrapedArticle,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ScrapedArticle {
        ScrapedArticle {
            title: "최저임금 조정 발표".to_string(),
            url: "https://nomu4.net/news/view.php?idx=1".to_string(),
            published_at: Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap(),
            section: Some("최신뉴스".to_string()),
            site: Site::Nomu,
            content: "정부가 최저임금 변경을 발표했다.".to_string(),
        }
    }

    #[test]
    fn test_site_labels_round_trip_through_from_str() {
        assert_eq!("세무사신문".parse::<Site>().unwrap(), Site::Kacta);
        assert_eq!("노무사신문".parse::<Site>().unwrap(), Site::Nomu);
        assert_eq!(Site::Kacta.to_string(), "세무사신문");
    }

    #[test]
    fn test_unknown_site_is_rejected() {
        assert!("조선일보".parse::<Site>().is_err());

        let json = r#"{
            "title": "t",
            "url": "https://example.com/a",
            "publishedAt": "2025-05-06T00:00:00Z",
            "section": null,
            "site": "조선일보",
            "content": "본문"
        }"#;
        assert!(serde_json::from_str::<ScrapedArticle>(json).is_err());
    }

    #[test]
    fn test_scraped_article_serializes_camel_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"publishedAt\""));
        assert!(json.contains("\"site\":\"노무사신문\""));
    }

    #[test]
    fn test_published_at_reads_rfc3339() {
        let json = r#"{
            "title": "t",
            "url": "https://example.com/a",
            "publishedAt": "2025-05-06T09:00:00+09:00",
            "section": null,
            "site": "세무사신문",
            "content": "본문"
        }"#;
        let article: ScrapedArticle = serde_json::from_str(json).unwrap();
        assert_eq!(
            article.published_at,
            Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_from_meta_overrides_published_at() {
        let meta = ArticleMeta {
            title: "제목".to_string(),
            url: "https://webzine.kacta.or.kr/news/articleView.html?idxno=1".to_string(),
            published_at: Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap(),
            section: None,
            site: Site::Kacta,
        };
        let real = Utc.with_ymd_and_hms(2025, 5, 1, 3, 0, 0).unwrap();
        let article = ScrapedArticle::from_meta(&meta, "본문".to_string(), real);
        assert_eq!(article.published_at, real);
        assert_eq!(article.title, meta.title);
        assert_eq!(article.site, Site::Kacta);
    }

    #[test]
    fn test_haystack_joins_title_and_content() {
        assert_eq!(
            sample().haystack(),
            "최저임금 조정 발표\n정부가 최저임금 변경을 발표했다."
        );
    }

    #[test]
    fn test_filtered_article_flattens_fields() {
        let filtered = FilteredArticle {
            article: sample(),
            tags: vec!["최저임금".to_string()],
        };
        let value: serde_json::Value = serde_json::to_value(&filtered).unwrap();
        assert_eq!(value["title"], "최저임금 조정 발표");
        assert_eq!(value["tags"][0], "최저임금");
    }
}
