use std::time::Duration;

use thiserror::Error;

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Failure kinds surfaced by the fetcher, the store and handler setup.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or unusable configuration; aborts the whole handler.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Non-2xx answer from a remote statistics source.
    #[error("upstream returned {status} for {url}")]
    Upstream {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid json from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Store write or read failed.
    #[error("database error on {table}: {message}")]
    Database { table: String, message: String },
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Config(_) => "config",
            IngestError::Timeout { .. } => "timeout",
            IngestError::Upstream { .. } => "upstream",
            IngestError::Parse { .. } => "parse",
            IngestError::Network { .. } => "network",
            IngestError::Database { .. } => "database",
        }
    }

    pub(crate) fn database(table: &str, err: impl std::fmt::Display) -> Self {
        IngestError::Database {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IngestError;

    #[test]
    fn upstream_display_carries_status() {
        let err = IngestError::Upstream {
            url: "https://stats.nba.com/stats/x".to_string(),
            status: 503,
            body: "busy".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.kind(), "upstream");
    }
}
