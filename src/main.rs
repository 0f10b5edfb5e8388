mod changeset;
mod checkpoint;
mod config;
mod error;
mod fetch;
mod ledger;
mod locator;
mod parser;
mod resolver;
mod sync;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::bail;
use chrono::{Local, NaiveDate};
use clap::Parser;

use crate::config::Settings;
use crate::fetch::HttpTransport;
use crate::resolver::AddressResolver;

const SAMPLE_NAME: &str = "FUNNULL TECHNOLOGY INC";
const SAMPLE_ADDRESS: &str = "0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510";

#[derive(Parser)]
#[command(
    name = "ofac_sync",
    about = "Sync sanctioned ETH addresses from OFAC recent actions into a CSV ledger"
)]
struct Cli {
    /// First publish date to process (default: resume from checkpoint)
    #[arg(value_parser = parse_date)]
    start: Option<NaiveDate>,
    /// Last publish date to process (default: today)
    #[arg(value_parser = parse_date)]
    end: Option<NaiveDate>,
    /// Resolve a known sample entry and exit without touching the ledger
    #[arg(long, conflicts_with = "start")]
    test: bool,
    /// Config file (default: ./ofac_sync.{toml,json,yaml} if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ledger CSV path
    #[arg(long)]
    ledger: Option<PathBuf>,
    /// Checkpoint file path
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got {:?}: {}", s, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.ledger {
        settings.ledger_path = path;
    }
    if let Some(path) = cli.checkpoint {
        settings.checkpoint_path = path;
    }

    let result = if cli.test {
        self_test(&settings).await
    } else {
        run_sync(&settings, cli.start, cli.end).await
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_sync(
    settings: &Settings,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let transport = HttpTransport::new(settings)?;
    let report = sync::run(&transport, settings, start, end, today).await?;

    for line in &report.apply.lines {
        println!("{}", line);
    }

    let apply = &report.apply;
    println!(
        "\n{} addition(s), {} deletion(s), {} unresolved",
        apply.added, apply.removed, apply.unresolved
    );
    if apply.already_present > 0 {
        println!("{} addition(s) already in the ledger", apply.already_present);
    }
    println!(
        "Ledger: {} rows across {} update page(s)",
        report.ledger_rows, report.build.pages
    );
    Ok(())
}

async fn self_test(settings: &Settings) -> anyhow::Result<()> {
    let transport = HttpTransport::new(settings)?;
    let resolver = AddressResolver::new(&transport, settings);
    let found = resolver.resolve(SAMPLE_NAME).await?;

    match found.as_deref() {
        Some(SAMPLE_ADDRESS) => {
            println!("OK: {} -> {}", SAMPLE_NAME, SAMPLE_ADDRESS);
            Ok(())
        }
        Some(other) => bail!(
            "{} resolved to {}, expected {}",
            SAMPLE_NAME,
            other,
            SAMPLE_ADDRESS
        ),
        None => bail!("no address found for {}", SAMPLE_NAME),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
