use serde_json::json;

use super::{HandlerOutcome, IngestContext, season_params, store_records};
use crate::error::IngestResult;
use crate::normalize::normalize;

const ENDPOINT: &str = "scheduleleaguev2";
pub(super) const TABLE: &str = "nba_schedule";
const CONFLICT_KEYS: &[&str] = &["season"];

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let records = normalize(&ctx.stats.fetch(ENDPOINT, &season_params(season))?);
    if records.is_empty() {
        return Ok(HandlerOutcome::NoData {
            message: "No schedule data returned".to_string(),
        });
    }

    let count = store_records(
        ctx,
        TABLE,
        CONFLICT_KEYS,
        vec![("season", json!(season))],
        records,
    )?;

    Ok(HandlerOutcome::Completed {
        message: format!("Schedule fetched successfully ({count} games)"),
        summary: None,
    })
}
