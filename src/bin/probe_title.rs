use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use tomato_scraper_rust::{BatchOrchestrator, Config, HtmlSession, HttpPageSource};

/// Run the search-match-extract pipeline for a single title and print the record
#[derive(Parser, Debug)]
#[command(name = "probe-title", version, about)]
struct Args {
    /// Movie title to look up
    title: String,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the whole batch report instead of the record
    #[arg(long)]
    report: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tomato_scraper_rust=debug,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    let source = HttpPageSource::new(&config.site.user_agent)?;
    let mut session = HtmlSession::new(source)
        .with_poll_interval(Duration::from_millis(config.timeouts.poll_interval_ms));

    let orchestrator = BatchOrchestrator::from_config(&config);
    let report = orchestrator.run(&mut session, &[args.title]).await;

    let json = if args.report {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&report.records)?
    };
    println!("{}", json);

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
