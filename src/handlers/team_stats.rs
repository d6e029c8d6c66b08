use std::time::Duration;

use serde_json::json;

use super::{
    HandlerOutcome, IngestContext, SEASON_TYPE, run_combinations, season_params, store_records,
};
use crate::error::IngestResult;
use crate::normalize::normalize;

const HANDLER: &str = "fetch-team-stats";
const ENDPOINT: &str = "leaguedashteamstats";
pub(super) const TABLE: &str = "nba_team_stats";
const CONFLICT_KEYS: &[&str] = &["season", "measure_type", "last_n_games", "group_quantity"];
const PAUSE: Duration = Duration::from_millis(500);

const MEASURE_TYPES: &[&str] = &["Advanced", "Misc", "Traditional", "Four Factors"];
const LAST_N_GAMES: &[Option<u32>] = &[None, Some(5)];
const GROUP_QUANTITIES: &[Option<&str>] = &[None, Some("Starters"), Some("Bench")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamStatsCombination {
    pub measure_type: &'static str,
    pub last_n_games: Option<u32>,
    pub group_quantity: Option<&'static str>,
}

impl TeamStatsCombination {
    /// Every measure type by last-N window; starter/bench splits are only
    /// kept for the traditional box score.
    pub fn all() -> Vec<Self> {
        let mut out = Vec::new();
        for &measure_type in MEASURE_TYPES {
            for &last_n_games in LAST_N_GAMES {
                for &group_quantity in GROUP_QUANTITIES {
                    if group_quantity.is_some() && measure_type != "Traditional" {
                        continue;
                    }
                    out.push(Self {
                        measure_type,
                        last_n_games,
                        group_quantity,
                    });
                }
            }
        }
        out
    }

    pub fn api_measure_type(&self) -> &'static str {
        match self.measure_type {
            "Traditional" => "Base",
            other => other,
        }
    }

    fn label(&self) -> String {
        format!(
            "{}, last_n_games={}, group={}",
            self.measure_type,
            self.last_n_games
                .map(|n| n.to_string())
                .unwrap_or_else(|| "null".to_string()),
            self.group_quantity.unwrap_or("null")
        )
    }
}

pub(super) fn run(ctx: &IngestContext<'_>, season: &str) -> IngestResult<HandlerOutcome> {
    let combos = TeamStatsCombination::all();
    let summary = run_combinations(
        HANDLER,
        &combos,
        ctx.pacing,
        PAUSE,
        TeamStatsCombination::label,
        |combo| {
            let mut params = season_params(season)
                .with("SeasonType", SEASON_TYPE)
                .with("MeasureType", combo.api_measure_type())
                .with("PerMode", "PerGame");
            if let Some(n) = combo.last_n_games {
                params.set("LastNGames", n.to_string());
            }
            if let Some(group) = combo.group_quantity {
                params.set("StarterBench", group);
            }

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
                    ("measure_type", json!(combo.measure_type)),
                    ("last_n_games", json!(combo.last_n_games)),
                    ("group_quantity", json!(combo.group_quantity)),
                ],
                records,
            )
            .map(Some)
        },
    );

    Ok(HandlerOutcome::Completed {
        message: format!(
            "Team stats fetched: {} successful, {} errors",
            summary.success_count, summary.error_count
        ),
        summary: Some(summary),
    })
}

#[cfg(test)]
mod tests {
    use super::TeamStatsCombination;

    #[test]
    fn combinations_keep_splits_for_traditional_only() {
        let combos = TeamStatsCombination::all();
        assert_eq!(combos.len(), 12);
        assert!(
            combos
                .iter()
                .filter(|c| c.group_quantity.is_some())
                .all(|c| c.measure_type == "Traditional")
        );
    }

    #[test]
    fn traditional_maps_to_base() {
        let combo = TeamStatsCombination::all()
            .into_iter()
            .find(|c| c.measure_type == "Traditional")
            .expect("traditional present");
        assert_eq!(combo.api_measure_type(), "Base");
    }
}
