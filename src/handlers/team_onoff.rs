use std::time::Duration;

use serde_json::json;
use tracing::warn;

use super::{
    HandlerOutcome, IngestContext, SEASON_TYPE, run_combinations, season_params, store_records,
};
use crate::error::IngestResult;
use crate::normalize::{normalize_merged, result_set_count};

const HANDLER: &str = "fetch-team-onoff";
const ENDPOINT: &str = "teamplayeronoffdetails";
pub(super) const TABLE: &str = "nba_team_onoff";
const CONFLICT_KEYS: &[&str] = &["season", "team_id"];
const PAUSE: Duration = Duration::from_millis(1000);

// Result sets: overall, players off court, players on court.
const SPLIT_SUFFIXES: &[&str] = &["_OFF_COURT", "_ON_COURT"];

const TEAM_IDS: [u32; 30] = [
    1610612737, 1610612738, 1610612739, 1610612740, 1610612741, 1610612742, 1610612743,
    1610612744, 1610612745, 1610612746, 1610612747, 1610612748, 1610612749, 1610612750,
    1610612751, 1610612752, 1610612753, 1610612754, 1610612755, 1610612756, 1610612757,
    1610612758, 1610612759, 1610612760, 1610612761, 1610612762, 1610612763, 1610612764,
    1610612765, 1610612766,
];

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let summary = run_combinations(
        HANDLER,
        &TEAM_IDS[..],
        ctx.pacing,
        PAUSE,
        |team_id| format!("team {team_id}"),
        |&team_id| {
            let params = season_params(season)
                .with("TeamID", team_id.to_string())
                .with("SeasonType", SEASON_TYPE)
                .with("PerMode", "Totals")
                .with("MeasureType", "Advanced");

            let value = ctx.stats.fetch(ENDPOINT, &params)?;
            let sets = result_set_count(&value);
            if sets < 1 + SPLIT_SUFFIXES.len() {
                warn!(handler = HANDLER, team_id, result_sets = sets, "insufficient result sets");
                return Ok(None);
            }

            let records = normalize_merged(&value, SPLIT_SUFFIXES);
            if records.is_empty() {
                return Ok(None);
            }
            store_records(
                ctx,
                TABLE,
                CONFLICT_KEYS,
                vec![("season", json!(season)), ("team_id", json!(team_id))],
                records,
            )
            .map(Some)
        },
    );

    Ok(HandlerOutcome::Completed {
        message: "Team on/off data fetched successfully".to_string(),
        summary: Some(summary),
    })
}
