use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::Result;
use crate::ledger::Ledger;

/// First SDN designation listing a digital currency address.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 11, 28).expect("valid calendar date")
}

/// Last fully processed date, stored as a single `YYYY-MM-DD` line.
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The stored date, if the file exists and holds one.
    pub fn stored(&self) -> Option<NaiveDate> {
        let text = fs::read_to_string(&self.path).ok()?;
        let text = text.trim();
        if text.is_empty() {
            warn!("Ignoring empty checkpoint {}", self.path.display());
            return None;
        }
        match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Start date for a resumed run: the stored checkpoint, else the newest
    /// ledger date, else [`epoch`].
    pub fn load(&self, ledger: &Ledger) -> NaiveDate {
        if let Some(date) = self.stored() {
            info!("Continuing from last processed date: {}", date);
            return date;
        }
        if let Some(date) = ledger.newest_date() {
            info!("No checkpoint, using newest ledger date: {}", date);
            return date;
        }
        let start = epoch();
        warn!("No checkpoint and empty ledger, starting from {}", start);
        start
    }

    /// Record `date`, never moving an existing checkpoint backwards.
    /// Returns the date actually stored.
    pub fn save(&self, date: NaiveDate) -> Result<NaiveDate> {
        let date = match self.stored() {
            Some(existing) if existing > date => existing,
            _ => date,
        };
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, date.format("%Y-%m-%d").to_string())?;
        fs::rename(&tmp, &self.path)?;
        info!("Saved last processed date to {}: {}", self.path.display(), date);
        Ok(date)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerRow;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ledger_with(dates: &[&str]) -> Ledger {
        Ledger::from_rows(
            dates
                .iter()
                .enumerate()
                .map(|(i, date)| LedgerRow {
                    date_added: d(date),
                    address: format!("0x{:040x}", i),
                    name: format!("NAME{}, Test", i),
                })
                .collect(),
        )
    }

    #[test]
    fn stored_date_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "2024-12-03\n").unwrap();
        let cp = Checkpoint::new(&path);
        assert_eq!(cp.load(&ledger_with(&["2025-01-01"])), d("2024-12-03"));
    }

    #[test]
    fn falls_back_to_newest_ledger_date() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Checkpoint::new(dir.path().join("log.txt"));
        let ledger = ledger_with(&["2023-02-01", "2024-06-30", "2024-01-15"]);
        assert_eq!(cp.load(&ledger), d("2024-06-30"));
    }

    #[test]
    fn malformed_checkpoint_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "December 3rd").unwrap();
        let cp = Checkpoint::new(&path);
        assert_eq!(cp.load(&ledger_with(&["2024-06-30"])), d("2024-06-30"));
    }

    #[test]
    fn epoch_when_nothing_is_known() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Checkpoint::new(dir.path().join("log.txt"));
        assert_eq!(cp.load(&Ledger::default()), d("2018-11-28"));
    }

    #[test]
    fn save_never_moves_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let cp = Checkpoint::new(&path);

        assert_eq!(cp.save(d("2024-12-03")).unwrap(), d("2024-12-03"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "2024-12-03");

        assert_eq!(cp.save(d("2024-11-01")).unwrap(), d("2024-12-03"));
        assert_eq!(cp.save(d("2024-12-10")).unwrap(), d("2024-12-10"));
        assert_eq!(cp.stored(), Some(d("2024-12-10")));
    }
}
