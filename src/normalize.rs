//! Columnar `resultSets` payloads into flat records.
//!
//! The NBA stats API answers with parallel header and row lists:
//!
//! ```json
//! { "resultSets": [ { "name": "...", "headers": ["TEAM_ID", "W"], "rowSet": [[1610612737, 10]] } ] }
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

pub type FlatRecord = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnarResult {
    pub result_sets: Vec<ResultSet>,
}

impl ColumnarResult {
    /// Lenient read: missing or null pieces become empty, never an error.
    pub fn from_value(value: &Value) -> Self {
        let result_sets = value
            .get("resultSets")
            .and_then(|v| v.as_array())
            .map(|sets| sets.iter().map(ResultSet::from_value).collect())
            .unwrap_or_default();
        Self { result_sets }
    }
}

impl ResultSet {
    fn from_value(value: &Value) -> Self {
        let headers = value
            .get("headers")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(header_name).collect())
            .unwrap_or_default();
        let rows = value
            .get("rowSet")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|row| row.as_array().cloned().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();
        Self { headers, rows }
    }

    pub fn records(&self) -> Vec<FlatRecord> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = FlatRecord::new();
                zip_row_into(&mut record, &self.headers, row, "");
                record
            })
            .collect()
    }
}

fn header_name(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Short rows are padded with null; surplus cells are dropped.
fn zip_row_into(out: &mut FlatRecord, headers: &[String], row: &[Value], suffix: &str) {
    for (idx, header) in headers.iter().enumerate() {
        let value = row.get(idx).cloned().unwrap_or(Value::Null);
        if suffix.is_empty() {
            out.insert(header.clone(), value);
        } else {
            out.insert(format!("{header}{suffix}"), value);
        }
    }
}

/// Records of the first result set, one per row.
pub fn normalize(value: &Value) -> Vec<FlatRecord> {
    let result = ColumnarResult::from_value(value);
    match result.result_sets.first() {
        Some(first) => first.records(),
        None => Vec::new(),
    }
}

pub fn result_set_count(value: &Value) -> usize {
    value
        .get("resultSets")
        .and_then(|v| v.as_array())
        .map(|sets| sets.len())
        .unwrap_or(0)
}

/// Merges split result sets onto the first one by row index.
///
/// Set `k + 1` contributes its columns with `suffixes[k]` appended. A split
/// set shorter than the primary leaves the extra primary rows unmerged.
/// Returns nothing unless every suffix has a result set to draw from.
pub fn normalize_merged(value: &Value, suffixes: &[&str]) -> Vec<FlatRecord> {
    let result = ColumnarResult::from_value(value);
    if result.result_sets.len() < 1 + suffixes.len() {
        return Vec::new();
    }
    let primary = &result.result_sets[0];
    let splits = &result.result_sets[1..=suffixes.len()];

    for (split, suffix) in splits.iter().zip(suffixes) {
        if split.rows.len() != primary.rows.len() {
            warn!(
                suffix,
                primary_rows = primary.rows.len(),
                split_rows = split.rows.len(),
                "split result set is not row-aligned with primary"
            );
        }
    }

    primary
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut record = FlatRecord::new();
            zip_row_into(&mut record, &primary.headers, row, "");
            for (split, suffix) in splits.iter().zip(suffixes) {
                if let Some(split_row) = split.rows.get(idx) {
                    zip_row_into(&mut record, &split.headers, split_row, suffix);
                }
            }
            record
        })
        .collect()
}

/// Joins `secondary` onto `primary` by equal `key` values.
///
/// `merge` sees every primary record together with the first secondary record
/// sharing its key, or `None`. Numbers compare by value, so `1` and `1.0`
/// match; a number never matches a string, so `1` and `"1"` do not.
pub fn join_by_key<F>(
    primary: Vec<FlatRecord>,
    secondary: &[FlatRecord],
    key: &str,
    mut merge: F,
) -> Vec<FlatRecord>
where
    F: FnMut(&mut FlatRecord, Option<&FlatRecord>),
{
    let mut index: HashMap<String, &FlatRecord> = HashMap::new();
    for record in secondary {
        if let Some(k) = record.get(key) {
            index.entry(join_key(k)).or_insert(record);
        }
    }

    primary
        .into_iter()
        .map(|mut record| {
            let matched = record
                .get(key)
                .and_then(|k| index.get(&join_key(k)).copied());
            merge(&mut record, matched);
            record
        })
        .collect()
}

fn join_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("n:{f}"),
            None => format!("n:{n}"),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{join_by_key, normalize, normalize_merged, result_set_count};

    #[test]
    fn normalize_zips_headers_with_row() {
        let payload = json!({
            "resultSets": [{
                "headers": ["TEAM_ID", "W", "L"],
                "rowSet": [[1610612737, 10, 5], [1610612738, 7, 8]]
            }]
        });
        let rows = normalize(&payload);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[0]["TEAM_ID"], json!(1610612737));
        assert_eq!(rows[1]["L"], json!(8));
    }

    #[test]
    fn normalize_empty_inputs() {
        assert!(normalize(&json!({})).is_empty());
        assert!(normalize(&json!({ "resultSets": [] })).is_empty());
        assert!(normalize(&json!({ "resultSets": [{ "headers": ["A"], "rowSet": [] }] })).is_empty());
        assert!(normalize(&json!({ "resultSets": [{ "headers": ["A"], "rowSet": null }] })).is_empty());
        assert!(normalize(&Value::Null).is_empty());
    }

    #[test]
    fn short_row_pads_with_null() {
        let payload = json!({
            "resultSets": [{ "headers": ["A", "B", "C"], "rowSet": [[1]] }]
        });
        let rows = normalize(&payload);
        assert_eq!(rows[0]["A"], json!(1));
        assert_eq!(rows[0]["B"], Value::Null);
        assert_eq!(rows[0]["C"], Value::Null);
    }

    #[test]
    fn merged_suffixes_follow_set_order() {
        let payload = json!({
            "resultSets": [
                { "headers": ["PLAYER", "NET"], "rowSet": [["a", 1.0], ["b", 2.0]] },
                { "headers": ["NET"], "rowSet": [[-1.0], [-2.0]] },
                { "headers": ["NET"], "rowSet": [[3.0], [4.0]] }
            ]
        });
        let rows = normalize_merged(&payload, &["_OFF_COURT", "_ON_COURT"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["PLAYER"], json!("b"));
        assert_eq!(rows[1]["NET"], json!(2.0));
        assert_eq!(rows[1]["NET_OFF_COURT"], json!(-2.0));
        assert_eq!(rows[1]["NET_ON_COURT"], json!(4.0));
    }

    #[test]
    fn merged_short_split_leaves_row_unsuffixed() {
        let payload = json!({
            "resultSets": [
                { "headers": ["ID"], "rowSet": [[1], [2]] },
                { "headers": ["X"], "rowSet": [[10]] },
                { "headers": ["X"], "rowSet": [[20], [21]] }
            ]
        });
        let rows = normalize_merged(&payload, &["_OFF_COURT", "_ON_COURT"]);
        assert!(rows[1].get("X_OFF_COURT").is_none());
        assert_eq!(rows[1]["X_ON_COURT"], json!(21));
    }

    #[test]
    fn merged_requires_enough_sets() {
        let payload = json!({
            "resultSets": [{ "headers": ["ID"], "rowSet": [[1]] }]
        });
        assert_eq!(result_set_count(&payload), 1);
        assert!(normalize_merged(&payload, &["_OFF_COURT", "_ON_COURT"]).is_empty());
    }

    #[test]
    fn join_by_key_takes_first_match_and_reports_misses() {
        let primary = normalize(&json!({
            "resultSets": [{ "headers": ["TEAM_ID"], "rowSet": [[1], [2]] }]
        }));
        let secondary = normalize(&json!({
            "resultSets": [{ "headers": ["TEAM_ID", "W"], "rowSet": [[1, 3], [1, 99]] }]
        }));
        let joined = join_by_key(primary, &secondary, "TEAM_ID", |rec, hit| {
            let w = hit.and_then(|h| h.get("W")).cloned().unwrap_or(json!(0));
            rec.insert("W".to_string(), w);
        });
        assert_eq!(joined[0]["W"], json!(3));
        assert_eq!(joined[1]["W"], json!(0));
    }

    #[test]
    fn join_by_key_matches_numbers_by_value_not_strings() {
        let primary = normalize(&json!({
            "resultSets": [{ "headers": ["TEAM_ID"], "rowSet": [[1610612737], [1610612738]] }]
        }));
        let secondary = normalize(&json!({
            "resultSets": [{ "headers": ["TEAM_ID", "W"], "rowSet": [[1610612737.0, 4], ["1610612738", 7]] }]
        }));
        let joined = join_by_key(primary, &secondary, "TEAM_ID", |rec, hit| {
            rec.insert("HIT".to_string(), json!(hit.is_some()));
        });
        assert_eq!(joined[0]["HIT"], json!(true));
        assert_eq!(joined[1]["HIT"], json!(false));
    }
}
