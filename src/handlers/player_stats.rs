use serde_json::json;

use super::{HandlerOutcome, IngestContext, SEASON_TYPE, season_params, store_records};
use crate::error::IngestResult;
use crate::normalize::normalize;

const ENDPOINT: &str = "leaguedashplayerstats";
pub(super) const TABLE: &str = "nba_player_stats";
const CONFLICT_KEYS: &[&str] = &["season", "measure_type"];
const MEASURE_TYPE: &str = "Advanced";

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let params = season_params(season)
        .with("SeasonType", SEASON_TYPE)
        .with("MeasureType", MEASURE_TYPE)
        .with("PerMode", "PerGame");

    let records = normalize(&ctx.stats.fetch(ENDPOINT, &params)?);
    if records.is_empty() {
        return Ok(HandlerOutcome::NoData {
            message: "No player stats data returned".to_string(),
        });
    }

    let count = store_records(
        ctx,
        TABLE,
        CONFLICT_KEYS,
        vec![("season", json!(season)), ("measure_type", json!(MEASURE_TYPE))],
        records,
    )?;

    Ok(HandlerOutcome::Completed {
        message: format!("Player stats fetched successfully ({count} players)"),
        summary: None,
    })
}
