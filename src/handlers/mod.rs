//! Ingestion handlers, one per stored dataset.
//!
//! Every handler walks its parameter combinations in order: fetch, normalize,
//! upsert, pause. Failures inside a combination are folded into a
//! [`RunSummary`]; only errors outside that loop turn into a 500 response.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::{IngestError, IngestResult};
use crate::normalize::FlatRecord;
use crate::pacing::Pacing;
use crate::stats_fetch::{QueryParams, StatsSource};
use crate::store::{PersistedRow, RunRecord, Store};

mod drives;
mod game_logs;
mod pbpstats;
mod player_index;
mod player_stats;
mod schedule;
mod standings;
mod synergy;
mod team_onoff;
mod team_stats;

pub use standings::attach_clutch_records;
pub use team_stats::TeamStatsCombination;

pub(crate) const LEAGUE_ID: &str = "00";
pub(crate) const SEASON_TYPE: &str = "Regular Season";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    TeamStats,
    PlayerStats,
    GameLogs,
    Synergy,
    Schedule,
    Standings,
    PlayerIndex,
    TeamOnOff,
    Drives,
    PbpStats,
}

impl HandlerKind {
    /// Run-all order.
    pub const ALL: [HandlerKind; 10] = [
        HandlerKind::TeamStats,
        HandlerKind::PlayerStats,
        HandlerKind::GameLogs,
        HandlerKind::Synergy,
        HandlerKind::Schedule,
        HandlerKind::Standings,
        HandlerKind::PlayerIndex,
        HandlerKind::TeamOnOff,
        HandlerKind::Drives,
        HandlerKind::PbpStats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HandlerKind::TeamStats => "fetch-team-stats",
            HandlerKind::PlayerStats => "fetch-player-stats",
            HandlerKind::GameLogs => "fetch-game-logs",
            HandlerKind::Synergy => "fetch-synergy-data",
            HandlerKind::Schedule => "fetch-schedule",
            HandlerKind::Standings => "fetch-standings",
            HandlerKind::PlayerIndex => "fetch-player-index",
            HandlerKind::TeamOnOff => "fetch-team-onoff",
            HandlerKind::Drives => "fetch-drives-stats",
            HandlerKind::PbpStats => "fetch-pbpstats",
        }
    }

    /// Accepts the handler name with or without the `fetch-` prefix.
    pub fn from_name(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|kind| {
            let name = kind.name();
            name == wanted || name.strip_prefix("fetch-") == Some(wanted.as_str())
        })
    }

    pub fn table(self) -> &'static str {
        match self {
            HandlerKind::TeamStats => team_stats::TABLE,
            HandlerKind::PlayerStats => player_stats::TABLE,
            HandlerKind::GameLogs => game_logs::TABLE,
            HandlerKind::Synergy => synergy::TABLE,
            HandlerKind::Schedule => schedule::TABLE,
            HandlerKind::Standings => standings::TABLE,
            HandlerKind::PlayerIndex => player_index::TABLE,
            HandlerKind::TeamOnOff => team_onoff::TABLE,
            HandlerKind::Drives => drives::TABLE,
            HandlerKind::PbpStats => pbpstats::TABLE,
        }
    }
}

/// Everything a handler reaches out to, passed in explicitly.
pub struct IngestContext<'a> {
    pub stats: &'a dyn StatsSource,
    pub pbpstats: &'a dyn StatsSource,
    pub store: &'a dyn Store,
    pub pacing: Pacing,
    pub default_season: String,
}

/// Incoming invocation; only an optional `{ "season": "YYYY-YY" }` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerRequest {
    pub body: Option<String>,
}

impl TriggerRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    pub fn for_season(season: &str) -> Self {
        Self::new(json!({ "season": season }).to_string())
    }

    /// Season override from the body, else `default`. Bad bodies are ignored.
    pub fn season(&self, default: &str) -> String {
        self.body
            .as_deref()
            .and_then(|raw| serde_json::from_str::<TriggerBody>(raw).ok())
            .and_then(|body| body.season)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TriggerBody {
    #[serde(default)]
    season: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn ok(message: &str, summary: Option<&RunSummary>) -> Self {
        let mut body = json!({ "success": true, "message": message });
        if let Some(summary) = summary {
            body["successCount"] = json!(summary.success_count);
            body["errorCount"] = json!(summary.error_count);
        }
        Self { status: 200, body }
    }

    pub fn not_found(message: &str) -> Self {
        Self {
            status: 404,
            body: json!({ "success": false, "message": message }),
        }
    }

    pub fn error(err: &IngestError, context: &str) -> Self {
        Self {
            status: 500,
            body: json!({ "error": err.to_string(), "context": context }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Result of a single parameter combination.
#[derive(Debug)]
pub enum CombinationOutcome {
    Stored(usize),
    Empty,
    Failed(IngestError),
}

impl From<IngestResult<Option<usize>>> for CombinationOutcome {
    fn from(result: IngestResult<Option<usize>>) -> Self {
        match result {
            Ok(Some(n)) => CombinationOutcome::Stored(n),
            Ok(None) => CombinationOutcome::Empty,
            Err(err) => CombinationOutcome::Failed(err),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub empty_count: usize,
    pub records_stored: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn record(&mut self, label: &str, outcome: CombinationOutcome) {
        match outcome {
            CombinationOutcome::Stored(n) => {
                self.success_count += 1;
                self.records_stored += n;
            }
            CombinationOutcome::Empty => self.empty_count += 1,
            CombinationOutcome::Failed(err) => {
                self.error_count += 1;
                self.errors.push(format!("{label}: {err}"));
            }
        }
    }
}

pub(crate) enum HandlerOutcome {
    Completed {
        message: String,
        summary: Option<RunSummary>,
    },
    NoData {
        message: String,
    },
}

/// Runs `step` for each combination in order, pausing between them.
///
/// `step` returns `Ok(Some(n))` after storing `n` records and `Ok(None)` when
/// the source had nothing for that combination.
pub fn run_combinations<C, L, S>(
    handler: &str,
    combos: &[C],
    pacing: Pacing,
    pause: Duration,
    label: L,
    step: S,
) -> RunSummary
where
    L: Fn(&C) -> String,
    S: FnMut(&C) -> IngestResult<Option<usize>>,
{
    run_combinations_with(handler, combos, label, step, || pacing.pause(pause))
}

/// [`run_combinations`] with the pause supplied by the caller.
///
/// `between` runs once between consecutive combinations, whatever the first
/// one's outcome, and never after the last.
pub fn run_combinations_with<C, L, S, P>(
    handler: &str,
    combos: &[C],
    label: L,
    mut step: S,
    mut between: P,
) -> RunSummary
where
    L: Fn(&C) -> String,
    S: FnMut(&C) -> IngestResult<Option<usize>>,
    P: FnMut(),
{
    let mut summary = RunSummary::default();
    for (idx, combo) in combos.iter().enumerate() {
        if idx > 0 {
            between();
        }
        let label = label(combo);
        let outcome = CombinationOutcome::from(step(combo));
        match &outcome {
            CombinationOutcome::Stored(n) => {
                info!(handler, combination = %label, records = n, "stored")
            }
            CombinationOutcome::Empty => info!(handler, combination = %label, "no data, skipping"),
            CombinationOutcome::Failed(err) => {
                error!(handler, combination = %label, kind = err.kind(), error = %err, "combination failed")
            }
        }
        summary.record(&label, outcome);
    }
    info!(
        handler,
        successful = summary.success_count,
        errors = summary.error_count,
        empty = summary.empty_count,
        "completed"
    );
    summary
}

pub(crate) fn season_params(season: &str) -> QueryParams {
    QueryParams::new()
        .with("LeagueID", LEAGUE_ID)
        .with("Season", season)
}

pub(crate) fn store_records(
    ctx: &IngestContext<'_>,
    table: &str,
    conflict_keys: &[&str],
    keys: Vec<(&str, Value)>,
    records: Vec<FlatRecord>,
) -> IngestResult<usize> {
    let count = records.len();
    let keys = keys
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    ctx.store
        .upsert(table, conflict_keys, &PersistedRow::new(keys, records))?;
    Ok(count)
}

/// Runs one handler to completion and shapes its response.
pub fn invoke(kind: HandlerKind, ctx: &IngestContext<'_>, request: &TriggerRequest) -> HandlerResponse {
    let season = request.season(&ctx.default_season);
    let started_at = Utc::now().to_rfc3339();
    info!(handler = kind.name(), %season, "starting fetch");

    let result = match kind {
        HandlerKind::TeamStats => team_stats::run(ctx, &season),
        HandlerKind::PlayerStats => player_stats::run(ctx, &season),
        HandlerKind::GameLogs => game_logs::run(ctx, &season),
        HandlerKind::Synergy => synergy::run(ctx, &season),
        HandlerKind::Schedule => schedule::run(ctx, &season),
        HandlerKind::Standings => standings::run(ctx, &season),
        HandlerKind::PlayerIndex => player_index::run(ctx, &season),
        HandlerKind::TeamOnOff => team_onoff::run(ctx, &season),
        HandlerKind::Drives => drives::run(ctx, &season),
        HandlerKind::PbpStats => pbpstats::run(ctx, &season),
    };

    let (response, summary) = match result {
        Ok(HandlerOutcome::Completed { message, summary }) => {
            (HandlerResponse::ok(&message, summary.as_ref()), summary)
        }
        Ok(HandlerOutcome::NoData { message }) => {
            warn!(handler = kind.name(), %season, "{message}");
            (HandlerResponse::not_found(&message), None)
        }
        Err(err) => {
            error!(handler = kind.name(), kind = err.kind(), error = %err, "handler aborted");
            let summary = RunSummary {
                error_count: 1,
                errors: vec![err.to_string()],
                ..RunSummary::default()
            };
            (HandlerResponse::error(&err, kind.name()), Some(summary))
        }
    };

    let summary = summary.unwrap_or_else(|| RunSummary {
        success_count: usize::from(response.is_success()),
        ..RunSummary::default()
    });
    let run = RunRecord {
        handler: kind.name().to_string(),
        season,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        success_count: summary.success_count,
        error_count: summary.error_count,
        errors: summary.errors,
    };
    if let Err(err) = ctx.store.record_run(&run) {
        warn!(handler = kind.name(), error = %err, "failed to record ingest run");
    }

    response
}
