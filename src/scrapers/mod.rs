//! Homepage and article scrapers for the two news sites.
//!
//! Each site is described by a static [`SiteProfile`]: which link groups to
//! read on the homepage, how to find titles and sections, where the real
//! publish time lives, and an ordered list of body containers to try. The
//! scraping follows the same two phases for every site:
//!
//! 1. **Listing**: parse the homepage into [`ArticleMeta`] candidates
//! 2. **Content**: fetch each candidate and extract its body text
//!
//! # Supported Sources
//!
//! | Source | Module | Cap | Publish time |
//! |--------|--------|-----|--------------|
//! | 세무사신문 | [`kacta`] | 30 | `article:published_time` meta tag |
//! | 노무사신문 | [`nomu`] | none | "등록" line in the article info block |
//!
//! Content fetches for all sites share one [`Scraper`], so the limit of
//! [`CONTENT_CONCURRENCY`] in-flight requests holds across the whole batch.
//! A page that fails to fetch or parse is logged and skipped.

use crate::http::{FetchError, FetchHtml};
use crate::models::{ArticleMeta, ScrapedArticle, Site};
use crate::utils::parse_date;
use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub mod kacta;
pub mod nomu;

/// Bodies shorter than this are treated as extraction failures.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Text blocks shorter than this are captions or boilerplate.
pub const MIN_LINE_CHARS: usize = 10;

/// Maximum simultaneous article fetches across all sites.
pub const CONTENT_CONCURRENCY: usize = 4;

pub const DEFAULT_SECTION: &str = "일반";

/// Every site the pipeline scrapes, in output order.
pub static SITES: [&SiteProfile; 2] = [&kacta::PROFILE, &nomu::PROFILE];

const TEXT_BLOCKS: &str = "p, li, div";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid selector {css:?}: {reason}")]
    Selector { css: &'static str, reason: String },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Rule mapping a homepage link to a section label.
#[derive(Debug)]
pub enum SectionRule {
    /// The link's `href` contains the pattern.
    Href(&'static str, &'static str),
    /// The selector group that produced the link contains the pattern.
    Group(&'static str, &'static str),
}

/// Where an article page keeps its publish time.
#[derive(Debug)]
pub enum PublishedAtSource {
    /// An attribute on the first element matching `selector`.
    Attribute {
        selector: &'static str,
        attr: &'static str,
    },
    /// The text of the last element matching `selector`, when it contains
    /// `marker`; the first capture group of `pattern` is the timestamp.
    InfoText {
        selector: &'static str,
        marker: &'static str,
        pattern: &'static Lazy<Regex>,
    },
}

/// Hand-tuned description of one site's markup.
#[derive(Debug)]
pub struct SiteProfile {
    pub site: Site,
    pub base_url: &'static str,
    /// Selectors for homepage link elements, read in order.
    pub link_groups: &'static [&'static str],
    /// Title candidates tried against each link's descendants.
    pub title_selectors: &'static [&'static str],
    /// Substring an article `href` must contain.
    pub url_marker: &'static str,
    pub sections: &'static [SectionRule],
    pub max_items: Option<usize>,
    pub published_at: PublishedAtSource,
    /// Body container candidates; the first one present on the page wins.
    pub body_selectors: &'static [&'static str],
}

fn selector(css: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector {
        css,
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// All elements matched by the first candidate that matches anything.
pub fn find_first_matches<'a>(
    document: &'a Html,
    candidates: &[&'static str],
) -> Result<Vec<ElementRef<'a>>, ScrapeError> {
    for &css in candidates {
        let matches: Vec<_> = document.select(&selector(css)?).collect();
        if !matches.is_empty() {
            debug!(selector = css, count = matches.len(), "Body selector matched");
            return Ok(matches);
        }
    }
    Ok(Vec::new())
}

fn first_text(link: ElementRef<'_>, candidates: &[Selector]) -> Option<String> {
    candidates.iter().find_map(|sel| {
        link.select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

pub fn classify_section(rules: &[SectionRule], group: &str, href: &str) -> String {
    rules
        .iter()
        .find_map(|rule| match rule {
            SectionRule::Href(pattern, label) if href.contains(pattern) => Some(*label),
            SectionRule::Group(pattern, label) if group.contains(pattern) => Some(*label),
            _ => None,
        })
        .unwrap_or(DEFAULT_SECTION)
        .to_string()
}

/// Parse a homepage into article candidates.
///
/// Links without a title, without an `href`, or whose `href` lacks the
/// site's URL marker are skipped, as are exact repeats of an earlier URL.
/// Every candidate is stamped with `scraped_at` until its page is read.
pub fn parse_list(
    profile: &SiteProfile,
    html: &str,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<ArticleMeta>, ScrapeError> {
    let document = Html::parse_document(html);
    let base = Url::parse(profile.base_url)?;
    let titles = profile
        .title_selectors
        .iter()
        .map(|&css| selector(css))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for &group in profile.link_groups {
        for link in document.select(&selector(group)?) {
            let Some(title) = first_text(link, &titles) else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !href.contains(profile.url_marker) {
                continue;
            }
            let Ok(url) = base.join(href) else {
                debug!(href, "Unresolvable link skipped");
                continue;
            };
            let url = url.to_string();
            if !seen.insert(url.clone()) {
                continue;
            }

            items.push(ArticleMeta {
                title,
                url,
                published_at: scraped_at,
                section: Some(classify_section(profile.sections, group, href)),
                site: profile.site,
            });
        }
    }

    if let Some(max) = profile.max_items {
        items.truncate(max);
    }
    Ok(items)
}

/// Raw publish-time text from an article page, if the page carries one.
fn extract_published_at(source: &PublishedAtSource, document: &Html) -> Option<String> {
    match source {
        PublishedAtSource::Attribute { selector: css, attr } => {
            let sel = selector(*css).ok()?;
            let raw = document.select(&sel).next()?.value().attr(attr)?;
            Some(raw.to_string())
        }
        PublishedAtSource::InfoText {
            selector: css,
            marker,
            pattern,
        } => {
            let sel = selector(*css).ok()?;
            let text = document.select(&sel).last().map(element_text)?;
            if !text.contains(*marker) {
                return None;
            }
            let caps = pattern.captures(&text)?;
            Some(caps.get(1)?.as_str().to_string())
        }
    }
}

/// Extract the body of an article page.
///
/// Returns `Ok(None)` when the body is missing or shorter than
/// [`MIN_CONTENT_CHARS`]. The publish time found on the page replaces the
/// placeholder on `meta`; if none is found the placeholder is kept.
pub fn parse_content(
    profile: &SiteProfile,
    meta: &ArticleMeta,
    html: &str,
) -> Result<Option<ScrapedArticle>, ScrapeError> {
    let document = Html::parse_document(html);
    let published_at = match extract_published_at(&profile.published_at, &document) {
        Some(raw) => parse_date(&raw, meta.published_at),
        None => meta.published_at,
    };

    let blocks = selector(TEXT_BLOCKS)?;
    let mut visited = HashSet::new();
    let lines: Vec<String> = find_first_matches(&document, profile.body_selectors)?
        .into_iter()
        .flat_map(|body| body.select(&blocks))
        .filter(|block| visited.insert(block.id()))
        .map(element_text)
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .collect();

    let content = lines.join("\n");
    if content.chars().count() < MIN_CONTENT_CHARS {
        return Ok(None);
    }
    Ok(Some(ScrapedArticle::from_meta(meta, content, published_at)))
}

/// Fetches listings and article bodies through one shared fetcher and one
/// shared concurrency budget.
pub struct Scraper<F> {
    fetcher: F,
    limiter: Semaphore,
}

impl<F: FetchHtml> Scraper<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_concurrency(fetcher, CONTENT_CONCURRENCY)
    }

    pub fn with_concurrency(fetcher: F, permits: usize) -> Self {
        Self {
            fetcher,
            limiter: Semaphore::new(permits),
        }
    }

    /// Fetch a site's homepage and parse its article list.
    #[instrument(level = "info", skip_all, fields(site = %profile.site))]
    pub async fn list_articles(&self, profile: &SiteProfile) -> Result<Vec<ArticleMeta>, ScrapeError> {
        let html = self.fetcher.fetch_html(profile.base_url).await?;
        let items = parse_list(profile, &html, Utc::now())?;
        info!(count = items.len(), source = profile.base_url, "Indexed article list");
        Ok(items)
    }

    async fn fetch_content(
        &self,
        profile: &SiteProfile,
        meta: &ArticleMeta,
    ) -> Result<Option<ScrapedArticle>, ScrapeError> {
        let html = self.fetcher.fetch_html(&meta.url).await?;
        parse_content(profile, meta, &html)
    }

    /// Fetch one article. Any failure is logged and yields `None`.
    #[instrument(level = "debug", skip_all, fields(url = %meta.url))]
    pub async fn scrape_content(
        &self,
        profile: &SiteProfile,
        meta: &ArticleMeta,
    ) -> Option<ScrapedArticle> {
        match self.fetch_content(profile, meta).await {
            Ok(Some(article)) => {
                debug!(chars = article.content.chars().count(), "Parsed article");
                Some(article)
            }
            Ok(None) => {
                warn!(site = %profile.site, url = %meta.url, "Article produced no usable content");
                None
            }
            Err(e) => {
                error!(site = %profile.site, url = %meta.url, error = %e, "Article extraction failed");
                None
            }
        }
    }

    /// Fetch bodies for every candidate, at most [`CONTENT_CONCURRENCY`] at
    /// a time across all concurrent callers.
    #[instrument(level = "info", skip_all, fields(site = %profile.site, candidates = metas.len()))]
    pub async fn enrich(&self, profile: &SiteProfile, metas: Vec<ArticleMeta>) -> Vec<ScrapedArticle> {
        let articles: Vec<ScrapedArticle> = stream::iter(metas)
            .map(|meta| async move {
                let _permit = match self.limiter.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(error = %e, "Concurrency limiter closed");
                        return None;
                    }
                };
                self.scrape_content(profile, &meta).await
            })
            .buffer_unordered(CONTENT_CONCURRENCY)
            .filter_map(|article| std::future::ready(article))
            .collect()
            .await;

        info!(count = articles.len(), "Extracted article contents");
        articles
    }

    /// List all sites concurrently, then hydrate every candidate.
    ///
    /// A homepage that cannot be fetched fails the whole scrape; individual
    /// articles never do.
    pub async fn scrape_sites(
        &self,
        profiles: &[&SiteProfile],
    ) -> Result<Vec<ScrapedArticle>, ScrapeError> {
        let lists = try_join_all(profiles.iter().map(|p| self.list_articles(p))).await?;

        let batches = join_all(
            profiles
                .iter()
                .zip(lists)
                .map(|(profile, metas)| self.enrich(profile, metas)),
        )
        .await;

        Ok(batches.into_iter().flatten().collect())
    }
}
