use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courtside_e::EmbeddedBackend;
use courtside_engine::backend::Backend;
use courtside_engine::capture::{ArtifactSink, DirectorySink, NullSink};
use courtside_engine::config::{ConfigLoader, CourtsideConfig, apply_env};
use courtside_engine::notify::{LogNotifier, Notifier, WebhookNotifier};
use courtside_engine::outcome::Outcome;
use courtside_engine::schedule::SiteClock;
use courtside_engine::selectors::SelectorTable;
use courtside_engine::BookingRun;
use courtside_h::{HeadlessBackend, LaunchOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courtside", version, about = "Books a sports court on the club's booking site")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Config file (default: ./courtside.yaml, then ~/.courtside/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Book this many days from today instead of the configured value
    #[arg(long, global = true)]
    days_ahead: Option<u32>,

    /// Print the resolved booking request and exit without a browser
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Use headless browser (Chromium) via CDP
    Headless {
        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
    },
    /// Use a running WebDriver server (chromedriver, geckodriver, WPEWebDriver)
    Embedded {
        /// WebDriver URL
        #[arg(long, env = "COURTSIDE_WEBDRIVER_URL")]
        driver_url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the JSON run report.
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            // Without a file, a webhook can still come from the environment.
            let mut fallback = CourtsideConfig::default();
            apply_env(&mut fallback, |key| std::env::var(key).ok());
            deliver(notifier(&fallback).as_ref(), Err(e)).await;
            return ExitCode::FAILURE;
        }
    };

    let result = match book(&args.mode, args.dry_run, &config).await {
        Ok(None) => return ExitCode::SUCCESS,
        Ok(Some(outcome)) => Ok(outcome),
        Err(e) => Err(e),
    };
    let outcome = deliver(notifier(&config).as_ref(), result).await;
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn load_config(args: &Args) -> Result<CourtsideConfig> {
    let mut config = ConfigLoader::load(args.config.as_deref())
        .await
        .context("loading configuration")?;
    if let Some(days) = args.days_ahead {
        config.booking.days_ahead = days;
    }
    if let Mode::Headless { visible: true } = args.mode {
        config.browser.headless = false;
    }
    Ok(config)
}

/// Runs one booking. `None` for a dry run, which only prints the request.
async fn book(mode: &Mode, dry_run: bool, config: &CourtsideConfig) -> Result<Option<Outcome>> {
    let clock = SiteClock::new(config.timezone()?);
    let request = config.booking_request(&clock)?;
    if dry_run {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(None);
    }

    let credentials = config.credentials()?;
    let table = SelectorTable::defaults().extend(&config.selectors);
    let sink: Box<dyn ArtifactSink> = if config.debug.capture {
        info!(dir = %config.debug.dir.display(), "saving debug artifacts");
        Box::new(DirectorySink::new(&config.debug.dir))
    } else {
        Box::new(NullSink)
    };

    let booking = BookingRun::new(config, &table, &request, &credentials, sink.as_ref())?;
    let mut backend = build_backend(mode, config);
    let report = booking.execute(&mut *backend).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(Some(report.outcome))
}

/// Hands the outcome to the notifier. A setup error that stopped the run
/// before it started becomes an ERROR outcome.
async fn deliver(notifier: &dyn Notifier, result: Result<Outcome>) -> Outcome {
    let outcome = result.unwrap_or_else(|e| {
        error!("{e:#}");
        Outcome::error(format!("Run could not start: {e:#}"))
    });
    if let Err(e) = notifier.notify(&outcome).await {
        warn!(error = %e, "notification failed");
    }
    outcome
}

fn build_backend(mode: &Mode, config: &CourtsideConfig) -> Box<dyn Backend> {
    match mode {
        Mode::Headless { .. } => Box::new(HeadlessBackend::with_options(LaunchOptions {
            headless: config.browser.headless,
            user_data_dir: config.browser.user_data_dir.clone(),
            ..LaunchOptions::default()
        })),
        Mode::Embedded { driver_url } => Box::new(
            EmbeddedBackend::new(driver_url.clone())
                .headless(config.browser.headless)
                .user_data_dir(config.browser.user_data_dir.clone()),
        ),
    }
}

fn notifier(config: &CourtsideConfig) -> Box<dyn Notifier> {
    let Some(url) = &config.notify.webhook_url else {
        return Box::new(LogNotifier);
    };
    match WebhookNotifier::new(url.clone()) {
        Ok(webhook) => Box::new(webhook),
        Err(e) => {
            warn!(error = %e, "webhook client unavailable, logging the outcome instead");
            Box::new(LogNotifier)
        }
    }
}
