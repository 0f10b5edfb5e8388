use chrono::NaiveDate;
use tracing::info;

use crate::changeset::{self, BuildStats};
use crate::checkpoint::Checkpoint;
use crate::config::Settings;
use crate::error::{Result, SyncError};
use crate::fetch::Transport;
use crate::ledger::{ApplyReport, Ledger};
use crate::locator;
use crate::resolver::AddressResolver;

pub struct RunReport {
    pub build: BuildStats,
    pub apply: ApplyReport,
    pub ledger_rows: usize,
}

/// Reject windows that start after they end or reach past `today`.
pub fn check_window(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<()> {
    if start > today {
        return Err(SyncError::Input(format!("start date {} is in the future", start)));
    }
    if end > today {
        return Err(SyncError::Input(format!("end date {} is in the future", end)));
    }
    if start > end {
        return Err(SyncError::Input(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    Ok(())
}

/// Locate, resolve and apply every update in `[start, end]` to `ledger`.
///
/// On error the ledger is left untouched: changes are only applied once
/// the whole window has been fetched and resolved.
pub async fn run_window<T: Transport>(
    transport: &T,
    settings: &Settings,
    ledger: &mut Ledger,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RunReport> {
    let pages = locator::locate(
        transport,
        &settings.index_url,
        start,
        end,
        settings.max_index_pages,
    )
    .await?;

    let resolver = AddressResolver::new(transport, settings);
    let (changes, build) = changeset::build(transport, &resolver, &pages).await?;
    info!(
        "{} addition(s) and {} deletion(s) from {} page(s), {} resolution failure(s)",
        build.additions,
        build.deletions,
        build.pages,
        build.resolution_failures
    );

    let apply = ledger.apply(&changes);
    Ok(RunReport {
        build,
        apply,
        ledger_rows: ledger.len(),
    })
}

/// One full invocation against the configured files. A missing `start`
/// resumes from the checkpoint, a missing `end` means `today`.
///
/// The ledger is saved before the checkpoint. Nothing is written unless
/// the whole window succeeds.
pub async fn run<T: Transport>(
    transport: &T,
    settings: &Settings,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<RunReport> {
    let mut ledger = Ledger::load(&settings.ledger_path)?;
    let checkpoint = Checkpoint::new(&settings.checkpoint_path);

    let start = match start {
        Some(date) => date,
        None => checkpoint.load(&ledger),
    };
    let end = end.unwrap_or(today);
    check_window(start, end, today)?;
    info!("Syncing updates published {} through {}", start, end);

    let report = run_window(transport, settings, &mut ledger, start, end).await?;

    ledger.save(&settings.ledger_path)?;
    checkpoint.save(end)?;
    Ok(report)
}

// ── Tests ──
