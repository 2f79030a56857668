use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tomato_scraper_rust::storage::write_report;
use tomato_scraper_rust::{
    BatchOrchestrator, Config, HtmlSession, HttpPageSource, ResultSink, SqliteSink, TitleLoader,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let matches = Command::new("Tomato Scraper (Rust)")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Scrape movie review metadata for a list of titles")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: search standard locations)")
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Spreadsheet or .txt list with the titles")
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("Result database connection URL")
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .help("Run the browsing session without a window")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("report")
                .short('r')
                .long("report")
                .value_name("FILE")
                .help("Also write the batch report as JSON")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(input) = matches.get_one::<String>("input") {
        config.input.path = PathBuf::from(input);
    }
    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database.url = url.clone();
    }
    if matches.get_flag("headless") {
        config.site.headless = true;
    }
    if let Some(report) = matches.get_one::<String>("report") {
        config.output.report_path = Some(PathBuf::from(report));
    }
    if matches.get_flag("verbose") {
        config.output.log_level = "debug".to_string();
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tomato_scraper_rust={},warn", config.output.log_level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Tomato Scraper (Rust) starting...");
    config.validate()?;
    info!("{}", config.summary());

    let loader = TitleLoader::new(&config.input.path, &config.input.column);
    let titles = loader
        .load()
        .with_context(|| format!("Failed to load titles from {}", loader.path().display()))?;
    if titles.is_empty() {
        warn!("No titles found in {}", loader.path().display());
    }

    let source = HttpPageSource::new(&config.site.user_agent)?;
    let mut session = HtmlSession::new(source)
        .with_poll_interval(Duration::from_millis(config.timeouts.poll_interval_ms));

    let orchestrator = BatchOrchestrator::from_config(&config);
    let report = orchestrator.run(&mut session, &titles).await;

    if let Some(path) = &config.output.report_path {
        if let Err(e) = write_report(&report, path).await {
            warn!("Could not write report: {}", e);
        }
    }

    let sink = SqliteSink::connect(&config.database.url, &config.database.table).await?;
    match sink.save(&report.records).await {
        Ok(written) => {
            sink.close().await;
            info!("🎉 Completed processing {} movies ({} rows stored)", report.total, written);
            info!("✅ Successful: {}", report.successful);
            info!("🔍 No exact match: {}", report.unmatched);
            info!("❌ Failed: {}", report.failed);
            Ok(())
        }
        Err(e) => {
            error!("Failed to store results: {}", e);
            Err(e.into())
        }
    }
}
