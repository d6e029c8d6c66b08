use std::time::Duration;

use serde_json::json;
use tracing::{error, info};

use super::{
    CombinationOutcome, HandlerOutcome, IngestContext, RunSummary, SEASON_TYPE, season_params,
    store_records,
};
use crate::error::IngestResult;
use crate::normalize::normalize;

const HANDLER: &str = "fetch-game-logs";
pub(super) const TABLE: &str = "nba_game_logs";
const CONFLICT_KEYS: &[&str] = &["season", "log_type"];
const PAUSE: Duration = Duration::from_millis(1000);

// (log_type, endpoint); one call returns the whole league.
const LOG_SOURCES: &[(&str, &str)] = &[("player", "playergamelog"), ("team", "teamgamelog")];

/// A failed fetch aborts the run; a failed write is logged and counted.
pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let mut summary = RunSummary::default();
    let mut counts = Vec::with_capacity(LOG_SOURCES.len());

    for (idx, (log_type, endpoint)) in LOG_SOURCES.iter().enumerate() {
        if idx > 0 {
            ctx.pacing.pause(PAUSE);
        }
        let params = season_params(season).with("SeasonType", SEASON_TYPE);
        let records = normalize(&ctx.stats.fetch(endpoint, &params)?);
        counts.push(records.len());
        if records.is_empty() {
            info!(handler = HANDLER, log_type, "no data, skipping");
            summary.record(log_type, CombinationOutcome::Empty);
            continue;
        }

        let outcome = match store_records(
            ctx,
            TABLE,
            CONFLICT_KEYS,
            vec![("season", json!(season)), ("log_type", json!(log_type))],
            records,
        ) {
            Ok(n) => {
                info!(handler = HANDLER, log_type, records = n, "stored game logs");
                CombinationOutcome::Stored(n)
            }
            Err(err) => {
                error!(handler = HANDLER, log_type, error = %err, "failed to store game logs");
                CombinationOutcome::Failed(err)
            }
        };
        summary.record(log_type, outcome);
    }

    Ok(HandlerOutcome::Completed {
        message: format!(
            "Game logs fetched successfully ({} player logs, {} team logs)",
            counts.first().copied().unwrap_or(0),
            counts.get(1).copied().unwrap_or(0)
        ),
        summary: Some(summary),
    })
}
