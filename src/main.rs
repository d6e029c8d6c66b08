use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nba_ingest::config::IngestConfig;
use nba_ingest::handlers::{self, HandlerKind, HandlerResponse, IngestContext, TriggerRequest};
use nba_ingest::pacing::Pacing;
use nba_ingest::stats_fetch::HttpStatsSource;
use nba_ingest::store::{RestStore, SqliteStore, Store};

const USAGE: &str = "usage: nba_ingest <handler|all|list> [--season YYYY-YY] [--db PATH] [--no-delay] [--delay-ms N]";

fn main() -> Result<ExitCode> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first().filter(|a| !a.starts_with("--")) else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::FAILURE);
    };

    if command == "list" {
        for kind in HandlerKind::ALL {
            println!("{}\t{}", kind.name(), kind.table());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let kinds = if command == "all" {
        HandlerKind::ALL.to_vec()
    } else {
        vec![HandlerKind::from_name(command).ok_or_else(|| anyhow!("unknown handler {command}\n{USAGE}"))?]
    };

    let request = match parse_flag_value(&args, "--season") {
        Some(season) => TriggerRequest::for_season(&season),
        None => TriggerRequest::default(),
    };
    let pacing = parse_pacing(&args)?;
    let db_path = parse_flag_value(&args, "--db").map(PathBuf::from);

    let config = match db_path {
        Some(_) => IngestConfig::local_from_env(),
        None => match IngestConfig::from_env() {
            Ok(cfg) => cfg,
            Err(err) => {
                for kind in &kinds {
                    print_response(*kind, &HandlerResponse::error(&err, kind.name()));
                }
                return Ok(ExitCode::FAILURE);
            }
        },
    };

    let store: Box<dyn Store> = match &db_path {
        Some(path) => Box::new(SqliteStore::open(path)?),
        None => {
            info!(store = %config.store_url_hint(), "using remote store");
            Box::new(RestStore::new(&config).context("build store client")?)
        }
    };
    let stats = HttpStatsSource::nba_stats(&config).context("build stats client")?;
    let pbpstats = HttpStatsSource::pbpstats(&config).context("build pbpstats client")?;

    let ctx = IngestContext {
        stats: &stats,
        pbpstats: &pbpstats,
        store: store.as_ref(),
        pacing,
        default_season: config.default_season.clone(),
    };

    let mut ok = 0usize;
    for kind in &kinds {
        let response = handlers::invoke(*kind, &ctx, &request);
        if response.is_success() {
            ok += 1;
        }
        print_response(*kind, &response);
    }

    if kinds.len() > 1 {
        println!("Results: {ok}/{} successful", kinds.len());
    }
    if let Some(path) = &db_path {
        println!("DB: {}", path.display());
    }

    Ok(if ok == kinds.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_response(kind: HandlerKind, response: &HandlerResponse) {
    let line = json!({
        "handler": kind.name(),
        "status": response.status,
        "body": response.body,
    });
    println!("{line}");
}

fn parse_pacing(args: &[String]) -> Result<Pacing> {
    if args.iter().any(|a| a == "--no-delay") {
        return Ok(Pacing::Disabled);
    }
    match parse_flag_value(args, "--delay-ms") {
        Some(raw) => {
            let ms = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid --delay-ms value {raw}"))?;
            Ok(Pacing::Override(Duration::from_millis(ms)))
        }
        None => Ok(Pacing::Fixed),
    }
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
