use std::path::Path;

use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder, Response};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::normalize::FlatRecord;

/// One durable row: key columns, the full record list and a write stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRow {
    pub keys: Vec<(String, Value)>,
    pub data: Vec<FlatRecord>,
    pub updated_at: String,
}

impl PersistedRow {
    pub fn new(keys: Vec<(String, Value)>, data: Vec<FlatRecord>) -> Self {
        Self {
            keys,
            data,
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn key(&self, column: &str) -> Option<&Value> {
        self.keys.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    /// `{ ...keys, data, updated_at }`
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (k, v) in &self.keys {
            out.insert(k.clone(), v.clone());
        }
        out.insert(
            "data".to_string(),
            Value::Array(self.data.iter().cloned().map(Value::Object).collect()),
        );
        out.insert(
            "updated_at".to_string(),
            Value::String(self.updated_at.clone()),
        );
        Value::Object(out)
    }

    /// Values of `conflict_keys` in order; every column must be present.
    pub fn conflict_values(&self, table: &str, conflict_keys: &[&str]) -> IngestResult<Vec<Value>> {
        conflict_keys
            .iter()
            .map(|column| {
                self.key(column).cloned().ok_or_else(|| {
                    IngestError::database(table, format!("row is missing conflict column {column}"))
                })
            })
            .collect()
    }
}

/// Summary of one handler invocation, kept by stores that track runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub handler: String,
    pub season: String,
    pub started_at: String,
    pub finished_at: String,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

pub trait Store {
    /// Writes `row`, replacing any row with the same conflict-key values.
    fn upsert(&self, table: &str, conflict_keys: &[&str], row: &PersistedRow) -> IngestResult<()>;

    fn record_run(&self, _run: &RunRecord) -> IngestResult<()> {
        Ok(())
    }
}

/// Supabase table store reached through PostgREST.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(cfg: &IngestConfig) -> IngestResult<Self> {
        if cfg.store_url.is_empty() || cfg.service_key.is_empty() {
            return Err(IngestError::Config(
                "store url and service key are required for the remote store".to_string(),
            ));
        }
        Ok(Self {
            client: Client::builder()
                .timeout(cfg.timeout)
                .build()
                .map_err(|err| {
                    IngestError::Config(format!("failed to build store client: {err}"))
                })?,
            base_url: cfg.store_url.trim_end_matches('/').to_string(),
            service_key: cfg.service_key.clone(),
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }
}

impl RestStore {
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    // `on_conflict` cannot target a unique index through null columns, so the
    // row is looked up with `is.null` filters, then patched by id or inserted.
    fn upsert_with_null_keys(
        &self,
        table: &str,
        conflict_keys: &[&str],
        values: &[Value],
        row: &PersistedRow,
    ) -> IngestResult<()> {
        let url = self.table_url(table);
        let mut lookup: Vec<(String, String)> = conflict_keys
            .iter()
            .zip(values)
            .map(|(column, value)| (column.to_string(), column_filter(value)))
            .collect();
        lookup.push(("select".to_string(), "id".to_string()));

        let resp = self
            .authorized(self.client.get(&url))
            .query(&lookup)
            .send()
            .map_err(|err| IngestError::database(table, err))?;
        let existing: Vec<Value> = check_status(table, resp)?
            .json()
            .map_err(|err| IngestError::database(table, err))?;

        let request = match existing.first().and_then(|r| r.get("id")) {
            Some(id) => {
                debug!(table, id = %id, "updating existing row");
                self.client
                    .patch(&url)
                    .query(&[("id", column_filter(id))])
            }
            None => self.client.post(&url),
        };
        let resp = self
            .authorized(request)
            .header("Prefer", "return=minimal")
            .json(&row.to_json())
            .send()
            .map_err(|err| IngestError::database(table, err))?;
        check_status(table, resp)?;
        Ok(())
    }
}

impl Store for RestStore {
    fn upsert(&self, table: &str, conflict_keys: &[&str], row: &PersistedRow) -> IngestResult<()> {
        let values = row.conflict_values(table, conflict_keys)?;
        if values.iter().any(Value::is_null) {
            return self.upsert_with_null_keys(table, conflict_keys, &values, row);
        }

        let url = self.table_url(table);
        let on_conflict = conflict_keys.join(",");
        let resp = self
            .authorized(self.client.post(&url))
            .query(&[("on_conflict", on_conflict.as_str())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row.to_json())
            .send()
            .map_err(|err| IngestError::database(table, err))?;
        check_status(table, resp)?;
        debug!(table, on_conflict, "row upserted");
        Ok(())
    }
}

fn check_status(table: &str, resp: Response) -> IngestResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(IngestError::database(
        table,
        format!("store returned {}: {}", status.as_u16(), body.trim()),
    ))
}

/// PostgREST filter operand for one column value.
fn column_filter(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

/// A persisted row read back from [`SqliteStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub keys: Map<String, Value>,
    pub data: Vec<FlatRecord>,
    pub updated_at: String,
}

/// Local store with the same replace-on-conflict behaviour.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        let store = Self { conn };
        store.init_schema().context("create sqlite schema")?;
        Ok(store)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        use anyhow::Context;

        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let store = Self { conn };
        store.init_schema().context("create sqlite schema")?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ingested_rows (
                table_name TEXT NOT NULL,
                conflict_key TEXT NOT NULL,
                keys_json TEXT NOT NULL,
                data_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (table_name, conflict_key)
            );

            CREATE TABLE IF NOT EXISTS ingest_runs (
                run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                handler TEXT NOT NULL,
                season TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                success_count INTEGER NOT NULL,
                error_count INTEGER NOT NULL,
                errors_json TEXT NOT NULL
            );
            "#,
        )
    }

    pub fn load_row(&self, table: &str, conflict_values: &[Value]) -> IngestResult<Option<StoredRow>> {
        let conflict_key = conflict_key_string(table, conflict_values)?;
        let raw = self
            .conn
            .query_row(
                "SELECT keys_json, data_json, updated_at FROM ingested_rows
                 WHERE table_name = ?1 AND conflict_key = ?2",
                params![table, conflict_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|err| IngestError::database(table, err))?;

        let Some((keys_json, data_json, updated_at)) = raw else {
            return Ok(None);
        };
        let keys = serde_json::from_str::<Map<String, Value>>(&keys_json)
            .map_err(|err| IngestError::database(table, err))?;
        let data = serde_json::from_str::<Vec<FlatRecord>>(&data_json)
            .map_err(|err| IngestError::database(table, err))?;
        Ok(Some(StoredRow {
            keys,
            data,
            updated_at,
        }))
    }

    pub fn count_rows(&self, table: &str) -> IngestResult<usize> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM ingested_rows WHERE table_name = ?1",
                params![table],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|err| IngestError::database(table, err))
    }

    pub fn recent_runs(&self, limit: usize) -> IngestResult<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT handler, season, started_at, finished_at, success_count, error_count, errors_json
                 FROM ingest_runs ORDER BY run_id DESC LIMIT ?1",
            )
            .map_err(|err| IngestError::database("ingest_runs", err))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let errors_json: String = row.get(6)?;
                Ok(RunRecord {
                    handler: row.get(0)?,
                    season: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    success_count: row.get::<_, i64>(4)? as usize,
                    error_count: row.get::<_, i64>(5)? as usize,
                    errors: serde_json::from_str(&errors_json).unwrap_or_default(),
                })
            })
            .map_err(|err| IngestError::database("ingest_runs", err))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| IngestError::database("ingest_runs", err))?);
        }
        Ok(out)
    }
}

impl Store for SqliteStore {
    fn upsert(&self, table: &str, conflict_keys: &[&str], row: &PersistedRow) -> IngestResult<()> {
        let values = row.conflict_values(table, conflict_keys)?;
        let conflict_key = conflict_key_string(table, &values)?;

        let keys: Map<String, Value> = row.keys.iter().cloned().collect();
        let keys_json =
            serde_json::to_string(&keys).map_err(|err| IngestError::database(table, err))?;
        let data_json =
            serde_json::to_string(&row.data).map_err(|err| IngestError::database(table, err))?;

        self.conn
            .execute(
                r#"
                INSERT INTO ingested_rows (table_name, conflict_key, keys_json, data_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(table_name, conflict_key) DO UPDATE SET
                    keys_json = excluded.keys_json,
                    data_json = excluded.data_json,
                    updated_at = excluded.updated_at
                "#,
                params![table, conflict_key, keys_json, data_json, row.updated_at],
            )
            .map_err(|err| IngestError::database(table, err))?;
        Ok(())
    }

    fn record_run(&self, run: &RunRecord) -> IngestResult<()> {
        let errors_json = serde_json::to_string(&run.errors).unwrap_or_else(|_| "[]".to_string());
        self.conn
            .execute(
                "INSERT INTO ingest_runs(handler, season, started_at, finished_at, success_count, error_count, errors_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    run.handler,
                    run.season,
                    run.started_at,
                    run.finished_at,
                    run.success_count as i64,
                    run.error_count as i64,
                    errors_json
                ],
            )
            .map_err(|err| IngestError::database("ingest_runs", err))?;
        Ok(())
    }
}

// Null conflict values compare equal here, unlike a default Postgres unique index.
fn conflict_key_string(table: &str, values: &[Value]) -> IngestResult<String> {
    serde_json::to_string(values).map_err(|err| IngestError::database(table, err))
}
