use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use nba_ingest::error::IngestError;
use nba_ingest::http_client::HeaderProfile;
use nba_ingest::normalize::normalize;
use nba_ingest::stats_fetch::{HttpStatsSource, QueryParams, StatsSource};

fn nba_source(base_url: &str, timeout: Duration) -> HttpStatsSource {
    HttpStatsSource::new(base_url, timeout, HeaderProfile::NbaStats).expect("client should build")
}

#[test]
fn success_returns_parsed_json_and_sends_browser_headers() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/leaguestandingsv3")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("LeagueID".into(), "00".into()),
            Matcher::UrlEncoded("Season".into(), "2024-25".into()),
            Matcher::UrlEncoded("SeasonType".into(), "Regular Season".into()),
        ]))
        .match_header("referer", "https://www.nba.com/")
        .match_header("origin", "https://www.nba.com")
        .match_header("user-agent", Matcher::Regex("^Mozilla/5.0".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "resultSets": [{ "headers": ["TEAM_ID", "W", "L"], "rowSet": [[1610612737, 10, 5]] }]
            })
            .to_string(),
        )
        .create();

    let source = nba_source(&server.url(), Duration::from_secs(5));
    let params = QueryParams::new()
        .with("LeagueID", "00")
        .with("Season", "2024-25")
        .with("SeasonType", "Regular Season");
    let value = source
        .fetch("leaguestandingsv3", &params)
        .expect("fetch should succeed");

    mock.assert();
    let rows = normalize(&value);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["W"], json!(10));
}

#[test]
fn non_success_status_is_upstream_error_with_code() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/playerindex")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("Service Unavailable")
        .create();

    let source = nba_source(&server.url(), Duration::from_secs(5));
    let err = source
        .fetch("playerindex", &QueryParams::new().with("Season", "2025-26"))
        .expect_err("503 should fail");

    match err {
        IngestError::Upstream { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[test]
fn client_error_status_is_upstream_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/synergyplaytypes")
        .match_query(Matcher::Any)
        .with_status(400)
        .create();

    let source = nba_source(&server.url(), Duration::from_secs(5));
    let err = source
        .fetch("synergyplaytypes", &QueryParams::new())
        .expect_err("400 should fail");
    assert!(matches!(err, IngestError::Upstream { status: 400, .. }));
}

#[test]
fn malformed_body_is_parse_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/scheduleleaguev2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>blocked</html>")
        .create();

    let source = nba_source(&server.url(), Duration::from_secs(5));
    let err = source
        .fetch("scheduleleaguev2", &QueryParams::new())
        .expect_err("html should not parse");
    assert!(matches!(err, IngestError::Parse { .. }));
}

#[test]
fn silent_upstream_is_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            thread::sleep(Duration::from_secs(5));
            drop(stream);
        }
    });

    let source = nba_source(&format!("http://{addr}"), Duration::from_millis(300));
    let err = source
        .fetch("leaguedashteamstats", &QueryParams::new())
        .expect_err("should time out");
    assert!(
        matches!(err, IngestError::Timeout { timeout, .. } if timeout == Duration::from_millis(300))
    );
}

#[test]
fn connection_refused_is_network_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    };

    let source = nba_source(&format!("http://{addr}"), Duration::from_secs(2));
    let err = source
        .fetch("playerindex", &QueryParams::new())
        .expect_err("nothing listening");
    assert!(matches!(err, IngestError::Network { .. }));
}
