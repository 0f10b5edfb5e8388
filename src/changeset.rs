use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::Result;
use crate::fetch::Transport;
use crate::locator::PageRef;
use crate::parser::{self, Event};
use crate::resolver::AddressResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Addition,
    Deletion,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Addition => f.write_str("Addition"),
            ChangeKind::Deletion => f.write_str("Deletion"),
        }
    }
}

/// A list change stamped with its page date. `address` is only ever set
/// on additions whose resolution succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChange {
    pub timestamp: NaiveDateTime,
    pub kind: ChangeKind,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    pub pages: usize,
    pub additions: usize,
    pub deletions: usize,
    pub resolution_failures: usize,
}

/// Fetch, extract and resolve each page in date order. Page fetch failures
/// abort the build; per-name resolution failures do not.
pub async fn build<T: Transport>(
    transport: &T,
    resolver: &AddressResolver<'_, T>,
    pages: &[PageRef],
) -> Result<(Vec<ResolvedChange>, BuildStats)> {
    let mut ordered: Vec<&PageRef> = pages.iter().collect();
    ordered.sort_by_key(|p| p.publish_date);

    let pb = ProgressBar::new(ordered.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({msg})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut changes = Vec::new();
    let mut stats = BuildStats::default();

    for page in ordered {
        pb.set_message(page.publish_date.to_string());
        info!("Processing {} ({})", page.url, page.publish_date);
        let html = transport.get(&page.url).await?;
        let events = parser::extract_events(&html);
        if events.is_empty() {
            info!("No list changes on {}", page.url);
        }

        let timestamp = page.publish_date.and_time(NaiveTime::default());
        for event in events {
            let change = match event {
                Event::Addition { name, category } => {
                    stats.additions += 1;
                    info!("Resolving {} {}", category, name);
                    let address = match resolver.resolve(&name).await {
                        Ok(Some(address)) => Some(address),
                        Ok(None) => {
                            warn!("No address found for {}", name);
                            None
                        }
                        Err(e) => {
                            warn!("{}", e);
                            stats.resolution_failures += 1;
                            None
                        }
                    };
                    ResolvedChange {
                        timestamp,
                        kind: ChangeKind::Addition,
                        name,
                        address,
                    }
                }
                Event::Deletion { name } => {
                    stats.deletions += 1;
                    ResolvedChange {
                        timestamp,
                        kind: ChangeKind::Deletion,
                        name,
                        address: None,
                    }
                }
            };
            changes.push(change);
        }

        stats.pages += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok((changes, stats))
}

// ── Tests ──
