use std::time::Duration;

use serde_json::json;

use super::{
    HandlerOutcome, IngestContext, SEASON_TYPE, run_combinations, season_params, store_records,
};
use crate::error::IngestResult;
use crate::normalize::normalize;

const HANDLER: &str = "fetch-synergy-data";
const ENDPOINT: &str = "synergyplaytypes";
pub(super) const TABLE: &str = "nba_synergy_data";
const CONFLICT_KEYS: &[&str] = &["season", "entity_type", "playtype", "type_grouping"];
const PAUSE: Duration = Duration::from_millis(500);

pub const PLAYTYPES: &[&str] = &[
    "Cut",
    "Handoff",
    "Isolation",
    "Misc",
    "OffScreen",
    "Postup",
    "PRBallHandler",
    "PRRollman",
    "OffRebound",
    "Spotup",
    "Transition",
];
const TYPE_GROUPINGS: &[&str] = &["offensive", "defensive"];
// (entity_type, PlayerOrTeam)
const ENTITY_TYPES: &[(&str, &str)] = &[("team", "T"), ("player", "P")];

struct Combination {
    entity_type: &'static str,
    player_or_team: &'static str,
    playtype: &'static str,
    type_grouping: &'static str,
}

fn combinations() -> Vec<Combination> {
    let mut out = Vec::with_capacity(ENTITY_TYPES.len() * PLAYTYPES.len() * TYPE_GROUPINGS.len());
    for &(entity_type, player_or_team) in ENTITY_TYPES {
        for &playtype in PLAYTYPES {
            for &type_grouping in TYPE_GROUPINGS {
                out.push(Combination {
                    entity_type,
                    player_or_team,
                    playtype,
                    type_grouping,
                });
            }
        }
    }
    out
}

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let combos = combinations();
    let summary = run_combinations(
        HANDLER,
        &combos,
        ctx.pacing,
        PAUSE,
        |c| format!("{} {} {}", c.entity_type, c.playtype, c.type_grouping),
        |c| {
            let params = season_params(season)
                .with("SeasonType", SEASON_TYPE)
                .with("PerMode", "Totals")
                .with("PlayerOrTeam", c.player_or_team)
                .with("PlayType", c.playtype)
                .with("TypeGrouping", c.type_grouping);

            let records = normalize(&ctx.stats.fetch(ENDPOINT, &params)?);
            if records.is_empty() {
                return Ok(None);
            }
            store_records(
                ctx,
                TABLE,
                CONFLICT_KEYS,
                vec![
                    ("season", json!(season)),
                    ("entity_type", json!(c.entity_type)),
                    ("playtype", json!(c.playtype)),
                    ("type_grouping", json!(c.type_grouping)),
                ],
                records,
            )
            .map(Some)
        },
    );

    Ok(HandlerOutcome::Completed {
        message: "Synergy data fetched successfully".to_string(),
        summary: Some(summary),
    })
}

#[cfg(test)]
mod tests {
    use super::combinations;

    #[test]
    fn enumerates_full_cross_product_team_first() {
        let combos = combinations();
        assert_eq!(combos.len(), 44);
        assert_eq!(combos[0].entity_type, "team");
        assert_eq!(combos[0].playtype, "Cut");
        assert_eq!(combos[1].type_grouping, "defensive");
        assert_eq!(combos[43].player_or_team, "P");
    }
}
