use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{Result, SyncError};
use crate::fetch::{RetryPolicy, Transport};
use crate::parser::entries::collapse_ws;

pub const SEARCH_NAME_FIELD: &str = "ctl00$MainContent$txtLastName";

// Search filters other than the name, left blank; the score slider at 100
// asks for exact matches only.
const SEARCH_DEFAULTS: &[(&str, &str)] = &[
    ("ctl00$MainContent$ddlType", ""),
    ("ctl00$MainContent$txtID", ""),
    ("ctl00$MainContent$txtAddress", ""),
    ("ctl00$MainContent$txtCity", ""),
    ("ctl00$MainContent$txtState", ""),
    ("ctl00$MainContent$ddlCountry", ""),
    ("ctl00$MainContent$ddlList", ""),
    ("ctl00$MainContent$Slider1", "100"),
    ("ctl00$MainContent$Slider1_Boundcontrol", "100"),
    ("ctl00$MainContent$btnSearch", "Search"),
];

static HIDDEN_INPUT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[type="hidden"][name]"#).unwrap());
static RESULTS_TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#gvSearchResults").unwrap());
static IDENT_TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div#ctl00_MainContent_pnlIdentification table#ctl00_MainContent_gvIdentification")
        .unwrap()
});
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// One row of the name-search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub detail_url: Option<String>,
    pub entry_type: String,
    pub program: String,
    pub score: String,
}

/// One `(type, value)` identification entry of a detail record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub id_type: String,
    pub value: String,
}

/// Maps a sanctioned name to the address recorded on its detail record.
pub struct AddressResolver<'a, T> {
    transport: &'a T,
    search_url: String,
    address_type: String,
    policy: RetryPolicy,
}

impl<'a, T: Transport> AddressResolver<'a, T> {
    pub fn new(transport: &'a T, settings: &Settings) -> Self {
        Self {
            transport,
            search_url: settings.search_url.clone(),
            address_type: settings.address_type.clone(),
            policy: settings.retry_policy(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `Ok(None)` when the name has no matching record or the record has no
    /// address of the configured type. Each step is retried per the policy.
    pub async fn resolve(&self, name: &str) -> Result<Option<String>> {
        let candidates = self
            .policy
            .run(&format!("search {}", name), move || self.search(name))
            .await
            .map_err(|e| self.resolution_error(name, e))?;

        let Some(detail_url) = first_match(&candidates, name) else {
            debug!("No search match for {} ({} result(s))", name, candidates.len());
            return Ok(None);
        };
        if candidates.len() > 1 {
            let listed: Vec<String> = candidates
                .iter()
                .map(|c| format!("{} [{} {} {}]", c.name, c.entry_type, c.program, c.score))
                .collect();
            debug!(
                "{} search results for {}, using {}: {}",
                candidates.len(),
                name,
                detail_url,
                listed.join("; ")
            );
        }

        let idents = self
            .policy
            .run(&format!("detail {}", detail_url), move || self.identifications(detail_url))
            .await
            .map_err(|e| self.resolution_error(name, e))?;

        let address = pick_address(&idents, &self.address_type);
        match &address {
            Some(a) => info!("Resolved {} -> {}", name, a),
            None => debug!("{} has no {} entry", name, self.address_type),
        }
        Ok(address)
    }

    /// Submit the search form for `name`, carrying the form's hidden state.
    pub async fn search(&self, name: &str) -> Result<Vec<Candidate>> {
        let form_page = self.transport.get(&self.search_url).await?;
        let form = search_form(&form_page, &self.search_url, name)?;
        let results = self.transport.post_form(&self.search_url, &form).await?;
        parse_search_results(&results, &self.search_url)
    }

    pub async fn identifications(&self, detail_url: &str) -> Result<Vec<Identification>> {
        let html = self.transport.get(detail_url).await?;
        Ok(parse_identifications(&html))
    }

    fn resolution_error(&self, name: &str, e: SyncError) -> SyncError {
        SyncError::Resolution {
            name: name.to_string(),
            attempts: self.policy.attempts(),
            reason: e.to_string(),
        }
    }
}

/// Hidden fields of the search page plus the query and default filters.
pub fn search_form(html: &str, url: &str, name: &str) -> Result<Vec<(String, String)>> {
    let doc = Html::parse_document(html);
    let mut form: Vec<(String, String)> = doc
        .select(&HIDDEN_INPUT_SEL)
        .filter_map(|input| {
            let field = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or("");
            Some((field.to_string(), value.to_string()))
        })
        .collect();
    if form.is_empty() {
        return Err(SyncError::parse(url, "search form has no hidden state"));
    }

    form.push((SEARCH_NAME_FIELD.to_string(), name.to_string()));
    form.extend(
        SEARCH_DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    Ok(form)
}

/// Rows of the results grid; a page without the grid means no results.
pub fn parse_search_results(html: &str, base_url: &str) -> Result<Vec<Candidate>> {
    let base = Url::parse(base_url).map_err(|e| SyncError::parse(base_url, e))?;
    let doc = Html::parse_document(html);
    let Some(table) = doc.select(&RESULTS_TABLE_SEL).next() else {
        return Ok(Vec::new());
    };

    let candidates = table
        .select(&ROW_SEL)
        .filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&CELL_SEL).collect();
            if cells.len() < 6 {
                return None;
            }
            let link = cells[0].select(&LINK_SEL).next();
            let name = collapse_ws(&link.unwrap_or(cells[0]).text().collect::<String>());
            let detail_url = link
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| base.join(href).ok())
                .map(|u| u.to_string());
            Some(Candidate {
                name,
                detail_url,
                entry_type: cell_text(cells[2]),
                program: cell_text(cells[3]),
                score: cell_text(cells[5]),
            })
        })
        .collect();
    Ok(candidates)
}

/// Identification grid of a detail record, header row skipped.
pub fn parse_identifications(html: &str) -> Vec<Identification> {
    let doc = Html::parse_document(html);
    let Some(table) = doc.select(&IDENT_TABLE_SEL).next() else {
        return Vec::new();
    };

    table
        .select(&ROW_SEL)
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&CELL_SEL).collect();
            if cells.len() < 2 {
                return None;
            }
            let id_type = cell_text(cells[0]);
            let value = cell_text(cells[1]);
            if id_type.is_empty() && value.is_empty() {
                return None;
            }
            Some(Identification { id_type, value })
        })
        .collect()
}

/// Detail URL of the first result whose name contains the query.
pub fn first_match<'c>(candidates: &'c [Candidate], query: &str) -> Option<&'c str> {
    let query = query.trim().to_lowercase();
    candidates
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&query))
        .find_map(|c| c.detail_url.as_deref())
}

pub fn pick_address(idents: &[Identification], address_type: &str) -> Option<String> {
    idents
        .iter()
        .find(|i| i.id_type == address_type && !i.value.is_empty())
        .map(|i| i.value.trim().to_lowercase())
}

fn cell_text(cell: ElementRef) -> String {
    collapse_ws(&cell.text().collect::<String>())
}

// ── Tests ──
