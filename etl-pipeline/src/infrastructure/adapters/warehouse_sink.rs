// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Postgres-backed [`WarehouseSink`]: the concrete warehouse driver behind
//! the domain port. Handles catalog inspection, schema-resolution caching,
//! per-table write serialization, and the four load-mode strategies.
//!
//! Bulk append streams rows through `sqlx`'s raw `COPY ... FROM STDIN`
//! support; upsert and increment batch `INSERT ... ON CONFLICT ... DO
//! UPDATE` statements instead of a staged `MERGE`, chunked to bound
//! statement size. Replace truncates, then delegates to append.

use async_trait::async_trait;
use dashmap::DashMap;
use etl_domain::{
    align, Column, ColumnSchema, ColumnType, EtlError, LoadMode, LoadOutcome, TableSchema, TabularPayload, Value,
    WarehouseSink,
};
use etl_domain::services::bulk_format;
use etl_domain::services::dedupe::{filter_new_rows, pk_keys};
use parking_lot::RwLock;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column as _, Row, TypeInfo};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows per `INSERT ... ON CONFLICT` statement in the upsert/increment path.
/// Keeps statement text (and the Postgres parser's work) bounded regardless
/// of payload size.
const UPSERT_CHUNK_SIZE: usize = 500;

/// Postgres-backed implementation of the warehouse port.
pub struct PostgresWarehouseSink {
    pool: sqlx::PgPool,
    schema_cache: RwLock<HashMap<String, TableSchema>>,
    table_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl PostgresWarehouseSink {
    /// Connects with a pool sized to `max_parallel` plus a small margin, per
    /// the "one warehouse session per concurrent caller" resource model.
    pub async fn connect(database_url: &str, max_parallel: u32) -> Result<Self, EtlError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_parallel + 2)
            .connect(database_url)
            .await
            .map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
        Ok(Self {
            pool,
            schema_cache: RwLock::new(HashMap::new()),
            table_locks: DashMap::new(),
        })
    }

    fn table_lock(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.table_locks.entry(table.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }

    /// Resolves `table`'s schema from the catalog, caching the result for the
    /// lifetime of this sink. A cache hit skips the catalog round trip
    /// entirely, matching "resolved once per table name per session."
    async fn resolve_schema(&self, table: &str) -> Result<TableSchema, EtlError> {
        if let Some(cached) = self.schema_cache.read().get(table) {
            return Ok(cached.clone());
        }

        let rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;

        if rows.is_empty() {
            return Err(EtlError::Data(format!("table '{table}' not found in catalog")));
        }

        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("column_name").unwrap_or_default();
                let data_type: String = row.try_get("data_type").unwrap_or_default();
                let is_nullable: String = row.try_get("is_nullable").unwrap_or_else(|_| "YES".into());
                ColumnSchema {
                    name,
                    column_type: column_type_from_catalog(&data_type),
                    nullable: is_nullable == "YES",
                }
            })
            .collect();

        let schema = TableSchema { columns };
        self.schema_cache.write().insert(table.to_string(), schema.clone());
        Ok(schema)
    }

    /// Auto-detects the primary-key columns for `table` from
    /// `information_schema.key_column_usage`, falling back to the caller's
    /// declared `pk_columns` when the catalog has none on record (e.g. the
    /// table predates a primary key constraint). Date-typed columns are
    /// dropped from the auto-detected set: a catalog-level date pk would
    /// silently reintroduce per-day keying under increment mode, which
    /// `TableConfig::validate` already refuses for declared pk_columns.
    async fn resolve_pk_columns(&self, table: &str, declared: &[String]) -> Result<Vec<String>, EtlError> {
        if !declared.is_empty() {
            return Ok(declared.to_vec());
        }
        let rows = sqlx::query(
            "SELECT kcu.column_name, c.data_type \
             FROM information_schema.key_column_usage kcu \
             JOIN information_schema.table_constraints tc \
               ON kcu.constraint_name = tc.constraint_name \
             JOIN information_schema.columns c \
               ON c.table_name = kcu.table_name AND c.column_name = kcu.column_name \
             WHERE tc.table_name = $1 AND tc.constraint_type = 'PRIMARY KEY' \
             ORDER BY kcu.ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
        Ok(rows
            .iter()
            .filter(|r| r.try_get::<String, _>("data_type").map(|t| t != "date").unwrap_or(true))
            .filter_map(|r| r.try_get("column_name").ok())
            .collect())
    }

    async fn append(&self, schema: &TableSchema, payload: TabularPayload, table: &str) -> Result<LoadOutcome, EtlError> {
        if payload.is_empty() {
            return Ok(LoadOutcome::default());
        }
        let copy_sql = build_copy_statement(table, &schema.column_names());
        let body = bulk_format::encode(&payload);
        let rows_inserted = payload.row_count() as u64;

        let mut conn = self.pool.acquire().await.map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
        let mut copy_in = conn
            .copy_in_raw(&copy_sql)
            .await
            .map_err(|e| EtlError::ConnectionFailure(format!("COPY FROM STDIN failed to start: {e}")))?;
        copy_in
            .send(body.as_bytes())
            .await
            .map_err(|e| EtlError::ConnectionFailure(format!("COPY FROM STDIN write failed: {e}")))?;
        copy_in
            .finish()
            .await
            .map_err(|e| EtlError::ConnectionFailure(format!("COPY FROM STDIN did not complete: {e}")))?;

        Ok(LoadOutcome { rows_inserted, rows_updated: 0 })
    }

    async fn append_with_dedupe(
        &self,
        schema: &TableSchema,
        payload: TabularPayload,
        table: &str,
        pk_columns: &[String],
    ) -> Result<LoadOutcome, EtlError> {
        if pk_columns.is_empty() || payload.is_empty() {
            return self.append(schema, payload, table).await;
        }
        let keys = pk_keys(&payload, pk_columns)?;
        let existing = self.existing_pk_keys(table, pk_columns, &keys).await?;
        let deduped = filter_new_rows(&payload, pk_columns, &existing)?;
        if deduped.is_empty() {
            debug!(table, "append: every row already present, nothing to copy");
            return Ok(LoadOutcome::default());
        }
        self.append(schema, deduped, table).await
    }

    /// Anti-join helper: which of `candidate_keys` are already present in
    /// `table`. Queried rather than loading the whole table's key set, so
    /// cost scales with the incoming payload, not the table's history.
    async fn existing_pk_keys(
        &self,
        table: &str,
        pk_columns: &[String],
        candidate_keys: &[Vec<String>],
    ) -> Result<HashSet<Vec<String>>, EtlError> {
        if candidate_keys.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = build_pk_lookup_statement(table, pk_columns, candidate_keys.len());
        let mut query = sqlx::query(&sql);
        for key in candidate_keys {
            for component in key {
                query = query.bind(component.clone());
            }
        }
        let rows = query.fetch_all(&self.pool).await.map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|row| pk_columns.iter().map(|c| row.try_get::<String, _>(c.as_str()).unwrap_or_default()).collect())
            .collect())
    }

    async fn upsert_or_increment(
        &self,
        payload: TabularPayload,
        table: &str,
        mode: LoadMode,
        pk_columns: &[String],
        increment_columns: &[String],
    ) -> Result<LoadOutcome, EtlError> {
        if pk_columns.is_empty() {
            return Err(EtlError::Integrity(format!("table '{table}' requires pk_columns for {mode}")));
        }
        let columns = payload.column_names();
        let mut outcome = LoadOutcome::default();

        for chunk_start in (0..payload.row_count()).step_by(UPSERT_CHUNK_SIZE) {
            let chunk_end = (chunk_start + UPSERT_CHUNK_SIZE).min(payload.row_count());
            let sql = build_upsert_statement(table, &columns, pk_columns, increment_columns, mode, chunk_end - chunk_start);
            let mut query = sqlx::query(&sql);
            for row_index in chunk_start..chunk_end {
                for (_, value) in payload.row(row_index) {
                    query = bind_value(query, value);
                }
            }
            let rows = query.fetch_all(&self.pool).await.map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
            for row in &rows {
                let was_insert: bool = row.try_get("inserted").unwrap_or(true);
                if was_insert {
                    outcome.rows_inserted += 1;
                } else {
                    outcome.rows_updated += 1;
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl WarehouseSink for PostgresWarehouseSink {
    async fn load(
        &self,
        payload: TabularPayload,
        table: &str,
        mode: LoadMode,
        pk_columns: &[String],
        increment_columns: &[String],
    ) -> Result<LoadOutcome, EtlError> {
        let lock = self.table_lock(table);
        let _guard = lock.lock().await;

        let schema = self.resolve_schema(table).await?;
        let (aligned, report) = align(&payload, &schema)?;
        if !report.dropped_columns.is_empty() {
            warn!(table, dropped = ?report.dropped_columns, "payload columns absent from target schema were dropped");
        }
        let pk_columns = self.resolve_pk_columns(table, pk_columns).await?;

        match mode {
            LoadMode::Append => self.append_with_dedupe(&schema, aligned, table, &pk_columns).await,
            LoadMode::Replace => {
                sqlx::query(&build_truncate_statement(table))
                    .execute(&self.pool)
                    .await
                    .map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
                self.append(&schema, aligned, table).await
            }
            LoadMode::Upsert | LoadMode::Increment => {
                self.upsert_or_increment(aligned, table, mode, &pk_columns, increment_columns).await
            }
        }
    }

    async fn query(&self, sql: &str) -> Result<TabularPayload, EtlError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
        rows_to_payload(&rows)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, EtlError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1) AS present")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EtlError::ConnectionFailure(e.to_string()))?;
        row.try_get("present").map_err(|e| EtlError::ConnectionFailure(e.to_string()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn column_type_from_catalog(data_type: &str) -> ColumnType {
    match data_type {
        "integer" | "bigint" | "smallint" => ColumnType::Integer,
        "double precision" | "real" | "numeric" => ColumnType::Floating,
        "boolean" => ColumnType::Boolean,
        "date" => ColumnType::Date,
        "timestamp with time zone" | "timestamp without time zone" => ColumnType::Timestamp,
        _ => ColumnType::String,
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Pure: the `COPY ... FROM STDIN` statement for `table` over `columns`, in
/// the exact column order the bulk-format encoder used.
fn build_copy_statement(table: &str, columns: &[&str]) -> String {
    let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT text, DELIMITER E'\\x{:02x}', NULL '{}')",
        quote_ident(table),
        column_list,
        bulk_format::DELIMITER as u32,
        bulk_format::NULL_SENTINEL
    )
}

fn build_truncate_statement(table: &str) -> String {
    format!("TRUNCATE TABLE {}", quote_ident(table))
}

/// Pure: a parameterized `SELECT` over the pk columns, restricted to a
/// `VALUES` list of candidate keys, used as the anti-join source for
/// append+dedupe.
fn build_pk_lookup_statement(table: &str, pk_columns: &[String], candidate_count: usize) -> String {
    let pk_list = pk_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let mut placeholder = 1;
    let value_rows: Vec<String> = (0..candidate_count)
        .map(|_| {
            let tuple = pk_columns.iter().map(|_| {
                let p = format!("${placeholder}");
                placeholder += 1;
                p
            });
            format!("({})", tuple.collect::<Vec<_>>().join(", "))
        })
        .collect();
    format!(
        "SELECT {pk_list} FROM {} WHERE ({pk_list}) IN (VALUES {})",
        quote_ident(table),
        value_rows.join(", ")
    )
}

/// Pure: a batched `INSERT ... ON CONFLICT (pk_columns) DO UPDATE` statement
/// for `row_count` rows, returning an `inserted` flag per row computed from
/// Postgres's `xmax = 0` trick (an inserted tuple's own transaction wrote
/// its xmax as 0; an updated tuple's does not survive `RETURNING` with that
/// value).
fn build_upsert_statement(
    table: &str,
    columns: &[&str],
    pk_columns: &[String],
    increment_columns: &[String],
    mode: LoadMode,
    row_count: usize,
) -> String {
    let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let mut placeholder = 1;
    let value_rows: Vec<String> = (0..row_count)
        .map(|_| {
            let tuple = columns.iter().map(|_| {
                let p = format!("${placeholder}");
                placeholder += 1;
                p
            });
            format!("({})", tuple.collect::<Vec<_>>().join(", "))
        })
        .collect();

    let pk_list = pk_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let update_targets: Vec<&str> = columns.iter().copied().filter(|c| !pk_columns.iter().any(|p| p == c)).collect();
    let set_clause = update_targets
        .iter()
        .map(|c| {
            let quoted = quote_ident(c);
            if mode == LoadMode::Increment && increment_columns.iter().any(|ic| ic == c) {
                format!("{quoted} = {table_alias}.{quoted} + EXCLUDED.{quoted}", table_alias = quote_ident(table))
            } else {
                format!("{quoted} = EXCLUDED.{quoted}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({column_list}) VALUES {values} \
         ON CONFLICT ({pk_list}) DO UPDATE SET {set_clause} \
         RETURNING (xmax = 0) AS inserted",
        table = quote_ident(table),
        values = value_rows.join(", "),
    )
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Text(s) => query.bind(s.as_str()),
        Value::Integer(i) => query.bind(*i),
        Value::Floating(f) => query.bind(*f),
        Value::Boolean(b) => query.bind(*b),
        Value::Date(d) => query.bind(*d),
        Value::Timestamp(t) => query.bind(*t),
        Value::Json(j) => query.bind(j.clone()),
        Value::Null => query.bind(Option::<String>::None),
    }
}

/// Decodes a generic query result into a `TabularPayload`, branching on each
/// column's Postgres type name since the caller's SQL is arbitrary.
fn rows_to_payload(rows: &[PgRow]) -> Result<TabularPayload, EtlError> {
    let Some(first) = rows.first() else {
        return Ok(TabularPayload::empty());
    };
    let column_names: Vec<String> = first.columns().iter().map(|c| c.name().to_string()).collect();
    let mut columns: Vec<Column> = column_names.iter().map(|n| Column::new(n.clone(), Vec::with_capacity(rows.len()))).collect();

    for row in rows {
        for (i, col) in row.columns().iter().enumerate() {
            let value = decode_cell(row, i, col.type_info().name())?;
            columns[i].values.push(value);
        }
    }
    TabularPayload::new(columns)
}

fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> Result<Value, EtlError> {
    let decode_err = |e: sqlx::Error| EtlError::Data(format!("failed to decode column {index} ({type_name}): {e}"));
    match type_name {
        "INT2" | "INT4" | "INT8" => {
            let v: Option<i64> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Integer).unwrap_or(Value::Null))
        }
        "FLOAT4" | "FLOAT8" | "NUMERIC" => {
            let v: Option<f64> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Floating).unwrap_or(Value::Null))
        }
        "BOOL" => {
            let v: Option<bool> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Boolean).unwrap_or(Value::Null))
        }
        "DATE" => {
            let v: Option<chrono::NaiveDate> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Date).unwrap_or(Value::Null))
        }
        "TIMESTAMP" | "TIMESTAMPTZ" => {
            let v: Option<chrono::DateTime<chrono::Utc>> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Timestamp).unwrap_or(Value::Null))
        }
        "JSON" | "JSONB" => {
            let v: Option<serde_json::Value> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Json).unwrap_or(Value::Null))
        }
        _ => {
            let v: Option<String> = row.try_get(index).map_err(decode_err)?;
            Ok(v.map(Value::Text).unwrap_or(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_statement_quotes_identifiers_and_declares_the_delimiter() {
        let sql = build_copy_statement("campaign", &["id", "name"]);
        assert!(sql.starts_with("COPY \"campaign\" (\"id\", \"name\") FROM STDIN"));
        assert!(sql.contains("NULL '\\N'"));
    }

    #[test]
    fn truncate_statement_quotes_the_table_name() {
        assert_eq!(build_truncate_statement("campaign"), "TRUNCATE TABLE \"campaign\"");
    }

    #[test]
    fn upsert_statement_uses_plain_assignment_for_non_increment_columns() {
        let sql = build_upsert_statement(
            "campaign",
            &["id", "name"],
            &["id".to_string()],
            &[],
            LoadMode::Upsert,
            2,
        );
        assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""));
        assert!(sql.contains("VALUES ($1, $2), ($3, $4)"));
        assert!(sql.contains("RETURNING (xmax = 0) AS inserted"));
    }

    #[test]
    fn increment_statement_adds_to_the_existing_column_instead_of_overwriting() {
        let sql = build_upsert_statement(
            "insights",
            &["creative_id", "impressions"],
            &["creative_id".to_string()],
            &["impressions".to_string()],
            LoadMode::Increment,
            1,
        );
        assert!(sql.contains("\"impressions\" = \"insights\".\"impressions\" + EXCLUDED.\"impressions\""));
    }

    #[test]
    fn pk_lookup_statement_builds_one_values_tuple_per_candidate_key() {
        let sql = build_pk_lookup_statement("campaign", &["id".to_string()], 3);
        assert!(sql.contains("VALUES ($1), ($2), ($3)"));
    }

    #[test]
    fn catalog_type_names_map_to_the_expected_column_type() {
        assert_eq!(column_type_from_catalog("bigint"), ColumnType::Integer);
        assert_eq!(column_type_from_catalog("double precision"), ColumnType::Floating);
        assert_eq!(column_type_from_catalog("character varying"), ColumnType::String);
    }
}
