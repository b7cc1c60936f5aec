//! The end-to-end briefing run.
//!
//! scrape → recency gate → filter → summarize → deliver. Every stage logs
//! its counts; the first stage error aborts the run.

use crate::api::AskAsync;
use crate::delivery::{MessageChannel, Notifier};
use crate::filter::filter_articles;
use crate::http::FetchHtml;
use crate::scrapers::{SITES, Scraper, SiteProfile};
use crate::summarize::Summarizer;
use crate::utils::{build_error_report, is_recent, kst};
use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;
use std::time::Instant;
use tracing::{error, info, instrument};

pub const FAILURE_CONTEXT: &str = "파이프라인 실패";

const ALERT_FAILURE_CONTEXT: &str = "실패 리포트 전송 실패";

/// Counts from a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub scraped: usize,
    pub recent: usize,
    pub filtered: usize,
}

fn briefing_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&kst()).date_naive()
}

pub struct Pipeline<F, A, C> {
    scraper: Scraper<F>,
    summarizer: Summarizer<A>,
    notifier: Notifier<C>,
    sites: &'static [&'static SiteProfile],
}

impl<F, A, C> Pipeline<F, A, C>
where
    F: FetchHtml,
    A: AskAsync<Response = String>,
    C: MessageChannel,
{
    pub fn new(scraper: Scraper<F>, summarizer: Summarizer<A>, notifier: Notifier<C>) -> Self {
        Self {
            scraper,
            summarizer,
            notifier,
            sites: &SITES,
        }
    }

    /// Restrict the run to the given sites.
    #[cfg(test)]
    pub fn with_sites(mut self, sites: &'static [&'static SiteProfile]) -> Self {
        self.sites = sites;
        self
    }

    /// Run every stage once.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<RunStats, Box<dyn Error>> {
        let t0 = Instant::now();
        info!(sites = self.sites.len(), "Pipeline started");

        let scraped = self.scraper.scrape_sites(self.sites).await?;
        let scraped_count = scraped.len();

        let now = Utc::now();
        let recent: Vec<_> = scraped
            .into_iter()
            .filter(|article| is_recent(article.published_at, now))
            .collect();
        info!(scraped = scraped_count, recent = recent.len(), "Collected recent articles");
        let recent_count = recent.len();

        let filtered = filter_articles(recent);
        info!(filtered = filtered.len(), "Filtered articles");

        let summary = self.summarizer.summarize(&filtered).await?;
        info!(chars = summary.chars().count(), "Summary generated");

        self.notifier
            .deliver(&summary, &filtered, briefing_date(Utc::now()))
            .await?;

        info!(elapsed_ms = t0.elapsed().as_millis(), "Briefing delivered");
        Ok(RunStats {
            scraped: scraped_count,
            recent: recent_count,
            filtered: filtered.len(),
        })
    }

    /// [`run`](Self::run), reporting any failure to the recipients.
    ///
    /// The original error is returned after the report is attempted.
    pub async fn run_and_report(&self) -> Result<RunStats, Box<dyn Error>> {
        match self.run().await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                report_failure(Some(&self.notifier), e.as_ref(), Utc::now()).await;
                Err(e)
            }
        }
    }
}

/// Log a failure report and send it when a notifier is available.
///
/// A failed send is logged and otherwise ignored.
pub async fn report_failure<C: MessageChannel>(
    notifier: Option<&Notifier<C>>,
    err: &dyn Error,
    now: DateTime<Utc>,
) {
    let report = build_error_report(FAILURE_CONTEXT, err, now);
    error!("{report}");

    let Some(notifier) = notifier else {
        return;
    };
    if let Err(e) = notifier.alert(&report, briefing_date(now)).await {
        error!("{}", build_error_report(ALERT_FAILURE_CONTEXT, &e, Utc::now()));
    }
}
