use thiserror::Error;

/// Failure taxonomy for a sync run.
///
/// `Input`, `Transport` and `Parse` abort the run before anything is
/// persisted. `Resolution` is caught per name by the change-set builder.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("unrecognized page format at {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("could not resolve {name} after {attempts} attempt(s): {reason}")]
    Resolution {
        name: String,
        attempts: u32,
        reason: String,
    },

    #[error("ledger error: {0}")]
    Ledger(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SyncError {
    pub fn transport(url: &str, reason: impl ToString) -> Self {
        SyncError::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: &str, reason: impl ToString) -> Self {
        SyncError::Parse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Network and markup failures may be transient; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
