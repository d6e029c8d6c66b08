use std::time::Duration;

use serde_json::{Value, json};

use super::{HandlerOutcome, IngestContext, SEASON_TYPE, run_combinations, store_records};
use crate::error::IngestResult;
use crate::normalize::FlatRecord;
use crate::stats_fetch::QueryParams;

const HANDLER: &str = "fetch-pbpstats";
const ENDPOINT: &str = "get-totals/nba";
pub(super) const TABLE: &str = "nba_pbpstats";
const CONFLICT_KEYS: &[&str] = &["season", "stat_type"];
const PAUSE: Duration = Duration::from_millis(500);

// (stat_type, Type)
const STAT_TYPES: &[(&str, &str)] = &[("team", "Team"), ("opponent", "Opponent")];

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let summary = run_combinations(
        HANDLER,
        STAT_TYPES,
        ctx.pacing,
        PAUSE,
        |(stat_type, _)| stat_type.to_string(),
        |&(stat_type, api_type)| {
            let params = QueryParams::new()
                .with("Season", season)
                .with("SeasonType", SEASON_TYPE)
                .with("Type", api_type);

            let records = table_rows(&ctx.pbpstats.fetch(ENDPOINT, &params)?);
            if records.is_empty() {
                return Ok(None);
            }
            store_records(
                ctx,
                TABLE,
                CONFLICT_KEYS,
                vec![("season", json!(season)), ("stat_type", json!(stat_type))],
                records,
            )
            .map(Some)
        },
    );

    Ok(HandlerOutcome::Completed {
        message: "pbpstats data fetched successfully".to_string(),
        summary: Some(summary),
    })
}

/// pbpstats already answers with row objects under `multi_row_table_data`.
fn table_rows(value: &Value) -> Vec<FlatRecord> {
    value
        .get("multi_row_table_data")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::table_rows;

    #[test]
    fn table_rows_reads_objects_only() {
        let value = json!({
            "multi_row_table_data": [{ "TeamAbbreviation": "ATL", "Points": 9000 }, 3]
        });
        let rows = table_rows(&value);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["TeamAbbreviation"], json!("ATL"));
        assert!(table_rows(&json!({})).is_empty());
    }
}
