use std::env;
use std::time::Duration;

use crate::error::{IngestError, IngestResult};

pub const CURRENT_SEASON: &str = "2025-26";

const DEFAULT_STATS_BASE_URL: &str = "https://stats.nba.com/stats";
const DEFAULT_PBPSTATS_BASE_URL: &str = "https://api.pbpstats.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings shared by the fetchers and the store, built once at startup.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub store_url: String,
    pub service_key: String,
    pub stats_base_url: String,
    pub pbpstats_base_url: String,
    pub timeout: Duration,
    pub default_season: String,
}

impl IngestConfig {
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`IngestConfig::from_env`] but store credentials are optional,
    /// for runs that write to a local database.
    pub fn local_from_env() -> Self {
        Self::local_from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = trimmed(lookup);
        let store_url = get("SUPABASE_URL").ok_or_else(|| {
            IngestError::Config("SUPABASE_URL environment variable is not set".to_string())
        })?;
        let service_key = get("SUPABASE_SERVICE_ROLE_KEY").ok_or_else(|| {
            IngestError::Config(
                "SUPABASE_SERVICE_ROLE_KEY environment variable is not set".to_string(),
            )
        })?;
        Ok(Self::assemble(&get, store_url, service_key))
    }

    pub fn local_from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = trimmed(lookup);
        let store_url = get("SUPABASE_URL").unwrap_or_default();
        let service_key = get("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default();
        Self::assemble(&get, store_url, service_key)
    }

    fn assemble(
        get: &dyn Fn(&str) -> Option<String>,
        store_url: String,
        service_key: String,
    ) -> Self {
        let timeout_secs = get("NBA_INGEST_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, 120);

        Self {
            store_url: store_url.trim_end_matches('/').to_string(),
            service_key,
            stats_base_url: get("NBA_STATS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_STATS_BASE_URL.to_string()),
            pbpstats_base_url: get("PBPSTATS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PBPSTATS_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            default_season: get("NBA_INGEST_SEASON").unwrap_or_else(|| CURRENT_SEASON.to_string()),
        }
    }

    /// Prefix safe to print; never includes the key.
    pub fn store_url_hint(&self) -> String {
        self.store_url.chars().take(30).collect()
    }
}

// Blank values count as unset.
fn trimmed<F>(lookup: F) -> impl Fn(&str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    move |key| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{CURRENT_SEASON, IngestConfig};
    use crate::error::IngestError;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_service_key_is_config_error() {
        let err = IngestConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://x.supabase.co")]))
            .expect_err("should fail");
        assert!(matches!(err, IngestError::Config(msg) if msg.contains("SUPABASE_SERVICE_ROLE_KEY")));
    }

    #[test]
    fn blank_url_counts_as_missing() {
        let err = IngestConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "   "),
            ("SUPABASE_SERVICE_ROLE_KEY", "k"),
        ]))
        .expect_err("should fail");
        assert!(matches!(err, IngestError::Config(msg) if msg.contains("SUPABASE_URL")));
    }

    #[test]
    fn local_build_tolerates_missing_store() {
        let cfg = IngestConfig::local_from_lookup(lookup(&[("NBA_INGEST_SEASON", "2023-24")]));
        assert!(cfg.store_url.is_empty());
        assert!(cfg.service_key.is_empty());
        assert_eq!(cfg.default_season, "2023-24");
    }

    #[test]
    fn defaults_applied() {
        let cfg = IngestConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://x.supabase.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "k"),
            ("NBA_INGEST_TIMEOUT_SECS", "999"),
        ]))
        .expect("valid");
        assert_eq!(cfg.store_url, "https://x.supabase.co");
        assert_eq!(cfg.stats_base_url, "https://stats.nba.com/stats");
        assert_eq!(cfg.timeout, Duration::from_secs(120));
        assert_eq!(cfg.default_season, CURRENT_SEASON);
    }

    #[test]
    fn timeout_defaults_to_thirty_seconds() {
        let cfg = IngestConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "k"),
        ]))
        .expect("valid");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.pbpstats_base_url, "https://api.pbpstats.com");

        let unparsable = IngestConfig::local_from_lookup(lookup(&[("NBA_INGEST_TIMEOUT_SECS", "soon")]));
        assert_eq!(unparsable.timeout, Duration::from_secs(30));
    }
}
