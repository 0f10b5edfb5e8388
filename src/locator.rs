use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::fetch::Transport;

static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[class*="search-result"]"#).unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static DATE_DIV_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[class*="margin-top-1"]"#).unwrap());
static ACTION_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/recent-actions/\d{8}").unwrap());
static LONG_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+ \d{1,2}, \d{4})").unwrap());

/// One dated update page listed on the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub url: String,
    pub publish_date: NaiveDate,
}

/// Rows found on one index page. `rows` counts row containers, parsed or not.
#[derive(Debug, Default)]
pub struct IndexPage {
    pub rows: usize,
    pub refs: Vec<PageRef>,
}

/// Walk the paginated update index and return every page published within
/// `[start, end]`, oldest first.
pub async fn locate<T: Transport>(
    transport: &T,
    index_url: &str,
    start: NaiveDate,
    end: NaiveDate,
    max_pages: u32,
) -> Result<Vec<PageRef>> {
    if max_pages == 0 {
        return Err(SyncError::parse(index_url, "index page budget is zero"));
    }
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    'pages: for page in 0..max_pages {
        let url = format!("{}?page={}", index_url, page);
        info!("Fetching index page {}", page);
        let html = transport.get(&url).await?;
        let listing = parse_index(&html, &url)?;

        if listing.rows == 0 {
            if page == 0 {
                return Err(SyncError::parse(&url, "no update rows on first index page"));
            }
            info!("No more index rows after page {}", page - 1);
            break;
        }
        if listing.refs.is_empty() {
            return Err(SyncError::parse(
                &url,
                format!("{} rows present but none recognizable", listing.rows),
            ));
        }

        for r in listing.refs {
            if r.publish_date < start {
                info!("Reached start date {}", start);
                break 'pages;
            }
            if r.publish_date <= end && seen.insert(r.url.clone()) {
                found.push(r);
            }
        }

        if page + 1 == max_pages {
            return Err(SyncError::parse(
                index_url,
                format!("start date {} not reached within {} index pages", start, max_pages),
            ));
        }
    }

    // Index lists newest first.
    found.reverse();
    found.sort_by_key(|r| r.publish_date);
    info!("Located {} update page(s) between {} and {}", found.len(), start, end);
    Ok(found)
}

/// Extract `(url, date)` rows from one index page, in listing order.
pub fn parse_index(html: &str, page_url: &str) -> Result<IndexPage> {
    let base = Url::parse(page_url).map_err(|e| SyncError::parse(page_url, e))?;
    let doc = Html::parse_document(html);
    let mut listing = IndexPage::default();
    let mut seen = HashSet::new();

    for row in doc.select(&ROW_SEL) {
        listing.rows += 1;
        let Some((href, date)) = parse_row(row) else {
            warn!("Skipping unrecognized index row on {}", page_url);
            continue;
        };
        let url = match base.join(&href) {
            Ok(u) => u.to_string(),
            Err(e) => {
                warn!("Skipping index row with bad link {}: {}", href, e);
                continue;
            }
        };
        if seen.insert(url.clone()) {
            listing.refs.push(PageRef {
                url,
                publish_date: date,
            });
        }
    }

    Ok(listing)
}

fn parse_row(row: ElementRef) -> Option<(String, NaiveDate)> {
    let href = row
        .select(&LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find(|h| ACTION_HREF_RE.is_match(h))?
        .to_string();

    // "December 03, 2024 - Counter Terrorism Designations; ..."
    let date_text: String = row.select(&DATE_DIV_SEL).last()?.text().collect();
    let date_str = LONG_DATE_RE.captures(&date_text)?.get(1)?.as_str();
    let date = NaiveDate::parse_from_str(date_str, "%B %d, %Y").ok()?;
    Some((href, date))
}

// ── Tests ──
