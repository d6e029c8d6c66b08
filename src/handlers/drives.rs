use std::time::Duration;

use serde_json::json;

use super::{
    HandlerOutcome, IngestContext, SEASON_TYPE, run_combinations, season_params, store_records,
};
use crate::error::IngestResult;
use crate::normalize::normalize;

const HANDLER: &str = "fetch-drives-stats";
const ENDPOINT: &str = "leaguedashptstats";
pub(super) const TABLE: &str = "nba_drives_stats";
const CONFLICT_KEYS: &[&str] = &["season", "entity_type"];
const PAUSE: Duration = Duration::from_millis(500);

const ENTITY_TYPES: &[(&str, &str)] = &[("player", "P"), ("team", "T")];

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let summary = run_combinations(
        HANDLER,
        ENTITY_TYPES,
        ctx.pacing,
        PAUSE,
        |(entity_type, _)| entity_type.to_string(),
        |&(entity_type, player_or_team)| {
            let params = season_params(season)
                .with("SeasonType", SEASON_TYPE)
                .with("PerMode", "Totals")
                .with("PtMeasureType", "Drives")
                .with("PlayerOrTeam", player_or_team);

            let records = normalize(&ctx.stats.fetch(ENDPOINT, &params)?);
            if records.is_empty() {
                return Ok(None);
            }
            store_records(
                ctx,
                TABLE,
                CONFLICT_KEYS,
                vec![("season", json!(season)), ("entity_type", json!(entity_type))],
                records,
            )
            .map(Some)
        },
    );

    Ok(HandlerOutcome::Completed {
        message: "Drives stats fetched successfully".to_string(),
        summary: Some(summary),
    })
}
