use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::http_client::{HeaderProfile, http_client};

const ERROR_BODY_LOG_CHARS: usize = 500;

/// Query string pairs, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces `key`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// A remote source of JSON statistics.
pub trait StatsSource {
    fn fetch(&self, endpoint: &str, params: &QueryParams) -> IngestResult<Value>;
}

impl<F> StatsSource for F
where
    F: Fn(&str, &QueryParams) -> IngestResult<Value>,
{
    fn fetch(&self, endpoint: &str, params: &QueryParams) -> IngestResult<Value> {
        self(endpoint, params)
    }
}

#[derive(Debug, Clone)]
pub struct HttpStatsSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpStatsSource {
    pub fn new(base_url: &str, timeout: Duration, profile: HeaderProfile) -> IngestResult<Self> {
        Ok(Self {
            client: http_client(timeout, profile)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn nba_stats(cfg: &IngestConfig) -> IngestResult<Self> {
        Self::new(&cfg.stats_base_url, cfg.timeout, HeaderProfile::NbaStats)
    }

    pub fn pbpstats(cfg: &IngestConfig) -> IngestResult<Self> {
        Self::new(&cfg.pbpstats_base_url, cfg.timeout, HeaderProfile::Plain)
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> IngestError {
        if err.is_timeout() {
            error!(url, timeout_secs = self.timeout.as_secs(), "request timed out");
            IngestError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            error!(url, error = %err, "fetch failed");
            IngestError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl StatsSource for HttpStatsSource {
    fn fetch(&self, endpoint: &str, params: &QueryParams) -> IngestResult<Value> {
        let url = self.endpoint_url(endpoint);
        debug!(url, params = ?params.pairs(), "fetching");

        let resp = self
            .client
            .get(&url)
            .query(params.pairs())
            .send()
            .map_err(|err| self.transport_error(&url, err))?;
        let status = resp.status();
        debug!(url, status = status.as_u16(), "response received");

        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LOG_CHARS).collect();
            error!(url, status = status.as_u16(), body = %snippet, "upstream error response");
            return Err(IngestError::Upstream {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .text()
            .map_err(|err| self.transport_error(&url, err))?;
        serde_json::from_str::<Value>(body.trim()).map_err(|err| IngestError::Parse {
            url,
            message: err.to_string(),
        })
    }
}
