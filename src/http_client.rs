use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT,
};

use crate::error::{IngestError, IngestResult};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// stats.nba.com drops requests that do not look like they came from nba.com.
static NBA_STATS_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
});

static PLAIN_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers
});

/// Header set sent with every request to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    NbaStats,
    Plain,
}

impl HeaderProfile {
    pub fn headers(self) -> &'static HeaderMap {
        match self {
            HeaderProfile::NbaStats => &NBA_STATS_HEADERS,
            HeaderProfile::Plain => &PLAIN_HEADERS,
        }
    }
}

pub fn http_client(timeout: Duration, profile: HeaderProfile) -> IngestResult<Client> {
    Client::builder()
        .timeout(timeout)
        .default_headers(profile.headers().clone())
        .build()
        .map_err(|err| IngestError::Config(format!("failed to build http client: {err}")))
}

#[cfg(test)]
mod tests {
    use reqwest::header::{ORIGIN, REFERER, USER_AGENT};

    use super::HeaderProfile;

    #[test]
    fn nba_profile_impersonates_browser() {
        let headers = HeaderProfile::NbaStats.headers();
        assert_eq!(headers[REFERER], "https://www.nba.com/");
        assert_eq!(headers[ORIGIN], "https://www.nba.com");
        assert!(
            headers[USER_AGENT]
                .to_str()
                .is_ok_and(|ua| ua.starts_with("Mozilla/5.0"))
        );
    }

    #[test]
    fn plain_profile_only_sets_agent() {
        let headers = HeaderProfile::Plain.headers();
        assert_eq!(headers.len(), 1);
        assert!(headers.get(REFERER).is_none());
    }
}
