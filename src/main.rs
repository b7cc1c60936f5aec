//! # HR Briefing
//!
//! A morning news briefing for HR and payroll teams. It scrapes two Korean
//! tax and labor news sites, keeps the articles that matter for HR work,
//! summarizes them with an LLM and sends the result over KakaoWork.
//!
//! ## Features
//!
//! - Scrapes 세무사신문 and 노무사신문 homepages and article pages
//! - Keeps articles from the last seven days that match HR/payroll keywords
//!   and drops promotional content
//! - Summarizes the batch through the Anthropic Messages API
//! - Delivers the briefing by email through KakaoWork, falling back to a
//!   conversation, and reports failures the same way
//!
//! ## Usage
//!
//! ```sh
//! ANTHROPIC_API_KEY=... KWORK_APP_KEY=... KWORK_TO_EMAIL=hr@example.com hr_briefing
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Scraping**: List each homepage and fetch article bodies (4 at a time)
//! 2. **Filtering**: Recency gate, validation, dedup and keyword rules
//! 3. **Summarizing**: One prompt for the whole batch, with retries
//! 4. **Delivery**: Chunked messages to every recipient

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod delivery;
mod filter;
mod http;
mod models;
mod pipeline;
mod scrapers;
mod summarize;
mod utils;

use cli::Cli;
use config::Settings;
use delivery::KakaoWorkClient;
use http::{BASE_RETRY_DELAY, HttpClient, MAX_RETRIES, RetryFetch};
use pipeline::{Pipeline, report_failure};
use scrapers::Scraper;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("hr_briefing starting up");

    let args = Cli::parse();
    let settings = match Settings::from_cli(args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    debug!(?settings, "Resolved settings");

    match run(&settings).await {
        Ok(()) => {
            let elapsed = start_time.elapsed();
            info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Execution failed");
            ExitCode::FAILURE
        }
    }
}

/// Build the collaborators and run the pipeline once.
///
/// A collaborator that cannot be built fails the run like any pipeline
/// stage, and is reported when delivery itself is available.
async fn run(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let notifier = match settings.notifier() {
        Ok(notifier) => notifier,
        Err(e) => {
            report_failure::<KakaoWorkClient>(None, &e, Utc::now()).await;
            return Err(e.into());
        }
    };
    let summarizer = match settings.summarizer() {
        Ok(summarizer) => summarizer,
        Err(e) => {
            report_failure(Some(&notifier), &e, Utc::now()).await;
            return Err(e.into());
        }
    };
    let client = match HttpClient::new() {
        Ok(client) => client,
        Err(e) => {
            report_failure(Some(&notifier), &e, Utc::now()).await;
            return Err(e.into());
        }
    };

    let scraper = Scraper::new(RetryFetch::new(client, MAX_RETRIES, BASE_RETRY_DELAY));
    let pipeline = Pipeline::new(scraper, summarizer, notifier);
    let stats = pipeline.run_and_report().await?;
    info!(
        scraped = stats.scraped,
        recent = stats.recent,
        filtered = stats.filtered,
        "Pipeline finished"
    );
    Ok(())
}
