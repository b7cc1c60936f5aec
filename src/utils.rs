//! Utility functions for dates, the recency window, and log formatting.
//!
//! - Lenient date parsing that always yields a timestamp
//! - The trailing seven-day recency gate applied before filtering
//! - Failure reports sent when the pipeline aborts
//! - String truncation for log previews

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use tracing::debug;

/// How far back an article may have been published and still be reported.
pub const RECENCY_DAYS: i64 = 7;

/// Korea Standard Time. Both sites publish naive local timestamps.
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static EMBEDDED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2}))?)?").unwrap()
});

const STRICT_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a date string scraped from a page, falling back to `now`.
///
/// Periods become hyphens and whitespace is collapsed, then the string is
/// tried against `YYYY-MM-DD`, `YYYY-MM-DD HH:mm` and `YYYY-MM-DD HH:mm:ss`.
/// If none of those match exactly, RFC 3339, RFC 2822 and any date embedded
/// in the text are tried. Naive values are read as KST.
pub fn parse_date(input: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    try_parse_date(input).unwrap_or_else(|| {
        debug!(input, "Unparseable date; using current time");
        now
    })
}

/// Like [`parse_date`] but reports failure instead of substituting `now`.
pub fn try_parse_date(input: &str) -> Option<DateTime<Utc>> {
    let cleaned = WHITESPACE
        .replace_all(&input.replace('.', "-"), " ")
        .trim()
        .to_string();

    parse_strict(&cleaned).or_else(|| parse_loose(input.trim(), &cleaned))
}

fn from_kst(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    kst()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_strict(cleaned: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        return from_kst(date.and_hms_opt(0, 0, 0)?);
    }
    STRICT_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(cleaned, format).ok())
        .and_then(from_kst)
}

fn parse_loose(raw: &str, cleaned: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return from_kst(naive);
    }

    let caps = EMBEDDED_DATE.captures(cleaned)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, number(2)?, number(3)?)?;
    let time = date.and_hms_opt(
        number(4).unwrap_or(0),
        number(5).unwrap_or(0),
        number(6).unwrap_or(0),
    )?;
    from_kst(time)
}

/// True when `published_at` lies within the last [`RECENCY_DAYS`] days.
///
/// Up to one day in the future is tolerated for clock skew between the
/// sites and this host.
pub fn is_recent(published_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    published_at > now - Duration::days(RECENCY_DAYS) && published_at < now + Duration::days(1)
}

/// Human-readable report for a pipeline failure.
pub fn build_error_report(context: &str, error: &dyn Error, now: DateTime<Utc>) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(&format!("\n원인: {cause}"));
        source = cause.source();
    }

    format!(
        "실패 지점: {context}\n타임스탬프: {}\n에러: {detail}",
        now.with_timezone(&kst()).format("%Y-%m-%d %H:%M:%S")
    )
}

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` characters and appends `…(+N chars)` when cut.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", kept, total - max)
    }
}
