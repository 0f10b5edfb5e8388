use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::changeset::{ChangeKind, ResolvedChange};
use crate::error::Result;

const HEADER: [&str; 3] = ["date_added", "address", "name"];

/// One currently-sanctioned address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date_added: NaiveDate,
    pub address: String,
    pub name: String,
}

/// Append-ordered table of sanctioned addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
}

/// Outcome of applying a change set: the audit lines plus counters.
#[derive(Debug, Default, Clone)]
pub struct ApplyReport {
    pub lines: Vec<String>,
    pub added: usize,
    pub removed: usize,
    pub unresolved: usize,
    pub already_present: usize,
}

impl Ledger {
    pub fn from_rows(rows: Vec<LedgerRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn newest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date_added).max()
    }

    /// Read the ledger CSV. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("{} not found, starting with an empty ledger", path.display());
            return Ok(Self::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<LedgerRow>, _>>()?;
        info!("Loaded {} ledger rows from {}", rows.len(), path.display());
        Ok(Self { rows })
    }

    /// Rewrite the ledger through a sibling temp file so readers never see
    /// a half-written table.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_path(&tmp)?;
            writer.write_record(HEADER)?;
            for row in &self.rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        info!("Wrote {} ledger rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Apply changes in order. Additions append a row, deletions drop every
    /// row with that exact name. One audit line per change.
    pub fn apply(&mut self, changes: &[ResolvedChange]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for change in changes {
            match (change.kind, &change.address) {
                (ChangeKind::Addition, None) => {
                    report.unresolved += 1;
                    report.lines.push(format!(
                        "{}: {} - {} - no address found",
                        change.kind, change.timestamp, change.name
                    ));
                }
                (ChangeKind::Addition, Some(address)) => {
                    let row = LedgerRow {
                        date_added: change.timestamp.date(),
                        address: address.clone(),
                        name: change.name.clone(),
                    };
                    // Overlapping windows replay the same page.
                    if self.rows.contains(&row) {
                        debug!("Already in ledger: {} - {}", row.name, row.address);
                        report.already_present += 1;
                    } else {
                        self.rows.push(row);
                        report.added += 1;
                    }
                    report.lines.push(format!(
                        "{}: {} - {} - {}",
                        change.kind, change.timestamp, change.name, address
                    ));
                }
                (ChangeKind::Deletion, _) => {
                    let before = self.rows.len();
                    self.rows.retain(|r| r.name != change.name);
                    let removed = before - self.rows.len();
                    if removed > 0 {
                        debug!("Removed {} row(s) for {}", removed, change.name);
                    }
                    report.removed += removed;
                    report
                        .lines
                        .push(format!("{}: {} - {}", change.kind, change.timestamp, change.name));
                }
            }
        }

        report
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn at(date: &str) -> chrono::NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(NaiveTime::default())
    }

    fn added(date: &str, name: &str, address: Option<&str>) -> ResolvedChange {
        ResolvedChange {
            timestamp: at(date),
            kind: ChangeKind::Addition,
            name: name.to_string(),
            address: address.map(str::to_string),
        }
    }

    fn deleted(date: &str, name: &str) -> ResolvedChange {
        ResolvedChange {
            timestamp: at(date),
            kind: ChangeKind::Deletion,
            name: name.to_string(),
            address: None,
        }
    }

    fn row(date: &str, address: &str, name: &str) -> LedgerRow {
        LedgerRow {
            date_added: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            address: address.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn resolved_addition_appends_one_row() {
        let mut ledger = Ledger::from_rows(vec![row("2024-01-02", "0xaaa", "OLD, Entry")]);
        let report = ledger.apply(&[added(
            "2024-12-03",
            "MUNOZ UCROS, Monica",
            Some("0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510"),
        )]);

        assert_eq!(ledger.len(), 2);
        assert_eq!(
            ledger.rows()[1],
            row(
                "2024-12-03",
                "0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510",
                "MUNOZ UCROS, Monica"
            )
        );
        assert_eq!(
            report.lines,
            vec!["Addition: 2024-12-03 00:00:00 - MUNOZ UCROS, Monica - 0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510"]
        );
    }

    #[test]
    fn unresolved_addition_only_logs() {
        let mut ledger = Ledger::default();
        let report = ledger.apply(&[added("2024-12-03", "RESTREPO, Carlos Andres", None)]);

        assert!(ledger.is_empty());
        assert_eq!(report.unresolved, 1);
        assert_eq!(
            report.lines,
            vec!["Addition: 2024-12-03 00:00:00 - RESTREPO, Carlos Andres - no address found"]
        );
    }

    #[test]
    fn deletion_removes_every_row_with_the_name() {
        let mut ledger = Ledger::from_rows(vec![
            row("2023-05-01", "0x111", "SOBOLEV, Nikita Aleksandrovich"),
            row("2023-06-01", "0x222", "OTHER, Person"),
            row("2023-07-01", "0x333", "SOBOLEV, Nikita Aleksandrovich"),
        ]);
        let report = ledger.apply(&[deleted("2024-12-05", "SOBOLEV, Nikita Aleksandrovich")]);

        assert_eq!(ledger.rows(), &[row("2023-06-01", "0x222", "OTHER, Person")]);
        assert_eq!(report.removed, 2);
        assert_eq!(
            report.lines,
            vec!["Deletion: 2024-12-05 00:00:00 - SOBOLEV, Nikita Aleksandrovich"]
        );
    }

    #[test]
    fn deletion_of_unknown_name_is_a_no_op() {
        let original = Ledger::from_rows(vec![row("2023-06-01", "0x222", "OTHER, Person")]);
        let mut ledger = original.clone();
        let report = ledger.apply(&[deleted("2024-12-05", "NOBODY, Here")]);

        assert_eq!(ledger, original);
        assert_eq!(report.removed, 0);
        assert_eq!(report.lines.len(), 1);
    }

    #[test]
    fn deletion_match_is_case_sensitive() {
        let mut ledger = Ledger::from_rows(vec![row("2023-06-01", "0x222", "OTHER, Person")]);
        ledger.apply(&[deleted("2024-12-05", "OTHER, PERSON")]);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn add_then_delete_in_one_run_leaves_nothing() {
        let mut ledger = Ledger::default();
        ledger.apply(&[
            added("2024-12-01", "DOE, Jane", Some("0xabc")),
            deleted("2024-12-03", "DOE, Jane"),
        ]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn replayed_addition_is_not_duplicated() {
        let mut ledger = Ledger::default();
        let change = added("2024-12-01", "DOE, Jane", Some("0xabc"));
        ledger.apply(&[change.clone()]);
        let report = ledger.apply(&[change]);

        assert_eq!(ledger.len(), 1);
        assert_eq!(report.already_present, 1);
        assert_eq!(report.lines.len(), 1);
    }

    #[test]
    fn save_then_load_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let ledger = Ledger::from_rows(vec![
            row("2024-12-03", "0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510", "MUNOZ UCROS, Monica"),
            row("2024-12-05", "0x333", "GARANTEX \"EUROPE\" OU"),
        ]);
        ledger.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date_added,address,name\n"));
        assert!(text.contains("2024-12-03,0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510,\"MUNOZ UCROS, Monica\""));

        let loaded = Ledger::load(&path).unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(loaded.newest_date().unwrap().to_string(), "2024-12-05");
    }

    #[test]
    fn empty_ledger_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        Ledger::default().save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "date_added,address,name\n");
        assert!(Ledger::load(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_empty_and_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Ledger::load(&dir.path().join("absent.csv")).unwrap().is_empty());

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "date_added,address,name\nyesterday,0x1,\"X, Y\"\n").unwrap();
        assert!(Ledger::load(&bad).is_err());
    }
}
