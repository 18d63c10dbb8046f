// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The builtin processing steps. Step names and parameter shapes are part of
//! the external contract: platform table configuration references them by
//! name, so renaming a step or changing its parameter keys is a breaking
//! change to every deployed config.

use super::processing_pipeline::{ProcessingStep, StepRegistry};
use chrono::{NaiveDate, TimeZone, Utc};
use etl_domain::{Column, EtlError, TabularPayload, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Registers every builtin step under its contract name. Caller-supplied
/// steps are added to the same registry afterward via `register`.
pub fn register_builtin_steps(registry: &mut StepRegistry) {
    registry.register("add_company", Arc::new(add_company) as Arc<dyn ProcessingStep>);
    registry.register("add_row_loaded_date", Arc::new(add_row_loaded_date));
    registry.register("extract_id_from_urn", Arc::new(extract_id_from_urn));
    registry.register("build_date_field", Arc::new(build_date_field));
    registry.register("convert_unix_timestamp", Arc::new(convert_unix_timestamp));
    registry.register("rename_column", Arc::new(rename_column));
    registry.register("replace_nan_with_zero", Arc::new(replace_nan_with_zero));
    registry.register("convert_nat_to_null", Arc::new(convert_nat_to_null));
    registry.register("modify_urn_account", Arc::new(modify_urn_account));
    registry.register("response_decoration", Arc::new(response_decoration));
    registry.register("aggregate_by_entity", Arc::new(aggregate_by_entity));
    registry.register("convert_costs", Arc::new(convert_costs));
    registry.register("extract_nested_actions", Arc::new(extract_nested_actions));
}

fn param_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn param_str_list(params: &serde_json::Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn param_str_map(params: &serde_json::Value, key: &str) -> HashMap<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn require_column<'a>(payload: &'a TabularPayload, name: &str) -> Result<&'a Column, EtlError> {
    payload
        .column(name)
        .ok_or_else(|| EtlError::Data(format!("column '{name}' not present in payload")))
}

fn with_extra_column(payload: &TabularPayload, column: Column) -> Result<TabularPayload, EtlError> {
    let mut columns = payload.columns().to_vec();
    columns.push(column);
    TabularPayload::new(columns)
}

fn replace_column(payload: &TabularPayload, replacement: Column) -> Result<TabularPayload, EtlError> {
    let columns = payload
        .columns()
        .iter()
        .map(|c| if c.name == replacement.name { replacement.clone() } else { c.clone() })
        .collect();
    TabularPayload::new(columns)
}

/// Adds a `company` column (or `output_column`, if given) derived from a
/// static `account_id -> company_id` mapping. Account ids absent from the
/// mapping become `null`.
fn add_company(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let source = param_str(params, "column").unwrap_or("account_id");
    let output = param_str(params, "output_column").unwrap_or("company").to_string();
    let mapping = param_str_map(params, "mapping");

    let column = require_column(payload, source)?;
    let values = column
        .values
        .iter()
        .map(|v| match mapping.get(&v.stringify()) {
            Some(company) => Value::Text(company.clone()),
            None => Value::Null,
        })
        .collect();
    with_extra_column(payload, Column::new(output, values))
}

/// Appends a timestamp column carrying the wall time at which this step ran,
/// the same value for every row in the payload.
fn add_row_loaded_date(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let output = param_str(params, "column").unwrap_or("row_loaded_date").to_string();
    let now = Value::Timestamp(Utc::now());
    let values = vec![now; payload.row_count()];
    with_extra_column(payload, Column::new(output, values))
}

/// For each configured column, replaces a `ns:a:b:c:N` URN with the trailing
/// numeric id `N`. Values that don't parse as a URN are left untouched.
fn extract_id_from_urn(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let mut result = payload.clone();
    for name in param_str_list(params, "columns") {
        let column = require_column(&result, &name)?;
        let values = column.values.iter().map(|v| urn_tail_id(v)).collect();
        result = replace_column(&result, Column::new(name, values))?;
    }
    Ok(result)
}

fn urn_tail_id(value: &Value) -> Value {
    match value {
        Value::Text(s) => match s.rsplit(':').next().and_then(|tail| tail.parse::<i64>().ok()) {
            Some(id) => Value::Integer(id),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Combines separate `year`/`month`/`day` integer columns into a single
/// `date` (or `output_column`) date column. Rows with an invalid calendar
/// date become `null`.
fn build_date_field(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let year_col = param_str(params, "year_column").unwrap_or("year");
    let month_col = param_str(params, "month_column").unwrap_or("month");
    let day_col = param_str(params, "day_column").unwrap_or("day");
    let output = param_str(params, "output_column").unwrap_or("date").to_string();

    let years = require_column(payload, year_col)?;
    let months = require_column(payload, month_col)?;
    let days = require_column(payload, day_col)?;

    let mut values = Vec::with_capacity(payload.row_count());
    for i in 0..payload.row_count() {
        let date = as_i64(&years.values[i])
            .zip(as_i64(&months.values[i]))
            .zip(as_i64(&days.values[i]))
            .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32));
        values.push(date.map(Value::Date).unwrap_or(Value::Null));
    }
    with_extra_column(payload, Column::new(output, values))
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Floating(f) => Some(*f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Converts named millisecond-since-epoch integer columns into timestamps.
fn convert_unix_timestamp(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let mut result = payload.clone();
    for name in param_str_list(params, "columns") {
        let column = require_column(&result, &name)?;
        let values = column
            .values
            .iter()
            .map(|v| match as_i64(v) {
                Some(millis) => Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            })
            .collect();
        result = replace_column(&result, Column::new(name, values))?;
    }
    Ok(result)
}

/// Renames columns per an `{old: new}` mapping. Columns not mentioned pass
/// through unchanged.
fn rename_column(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let mapping = param_str_map(params, "mapping");
    let columns = payload
        .columns()
        .iter()
        .map(|c| match mapping.get(&c.name) {
            Some(new_name) => Column::new(new_name.clone(), c.values.clone()),
            None => c.clone(),
        })
        .collect();
    TabularPayload::new(columns)
}

/// For named numeric columns, null/NaN/empty-string values become `0`
/// (`0.0` for floating columns).
fn replace_nan_with_zero(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let mut result = payload.clone();
    for name in param_str_list(params, "columns") {
        let column = require_column(&result, &name)?;
        let is_float = column.values.iter().any(|v| matches!(v, Value::Floating(_)));
        let zero = if is_float { Value::Floating(0.0) } else { Value::Integer(0) };
        let values = column
            .values
            .iter()
            .map(|v| if v.is_nan_like() { zero.clone() } else { v.clone() })
            .collect();
        result = replace_column(&result, Column::new(name, values))?;
    }
    Ok(result)
}

/// For named timestamp/date columns, the not-a-time sentinel (`"NaT"`, case
/// insensitive) becomes `null`.
fn convert_nat_to_null(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let mut result = payload.clone();
    for name in param_str_list(params, "columns") {
        let column = require_column(&result, &name)?;
        let values = column
            .values
            .iter()
            .map(|v| match v {
                Value::Text(s) if s.trim().eq_ignore_ascii_case("nat") => Value::Null,
                other => other.clone(),
            })
            .collect();
        result = replace_column(&result, Column::new(name, values))?;
    }
    Ok(result)
}

/// Extracts the account id segment from a URN column (e.g.
/// `urn:li:sponsoredAccount:12345` -> `12345`) into a new column, leaving the
/// source column untouched.
fn modify_urn_account(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let source = param_str(params, "column").unwrap_or("urn");
    let output = param_str(params, "output_column").unwrap_or("account_id").to_string();
    let column = require_column(payload, source)?;
    let values = column.values.iter().map(urn_tail_id).collect();
    with_extra_column(payload, Column::new(output, values))
}

/// Lifts a field out of a nested JSON-ish response column into a scalar
/// top-level column, following a dotted `field_path` (e.g. `"data.id"`).
fn response_decoration(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let source = param_str(params, "source_column").unwrap_or("response");
    let output = param_str(params, "output_column").unwrap_or("decorated_value").to_string();
    let path: Vec<&str> = param_str(params, "field_path").unwrap_or_default().split('.').collect();

    let column = require_column(payload, source)?;
    let values = column
        .values
        .iter()
        .map(|v| match v {
            Value::Json(json) => lookup_path(json, &path).map(json_to_value).unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();
    with_extra_column(payload, Column::new(output, values))
}

fn lookup_path<'a>(json: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    path.iter().try_fold(json, |current, key| current.get(key))
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .unwrap_or_else(|| Value::Floating(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Json(other.clone()),
    }
}

/// Groups rows by entity columns (or every column whose name ends in `id`/
/// `_id`, auto-detected when `entity_columns` is empty), summing metric
/// columns (or every remaining numeric column, auto-detected when
/// `metric_columns` is empty). Reduces many rows per entity to one.
fn aggregate_by_entity(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let configured_entities = param_str_list(params, "entity_columns");
    let configured_metrics = param_str_list(params, "metric_columns");

    let entity_columns: Vec<String> = if configured_entities.is_empty() {
        payload
            .column_names()
            .into_iter()
            .filter(|name| name.ends_with("id") || name.ends_with("_id"))
            .map(String::from)
            .collect()
    } else {
        configured_entities
    };

    let metric_columns: Vec<String> = if configured_metrics.is_empty() {
        payload
            .columns()
            .iter()
            .filter(|c| !entity_columns.contains(&c.name) && is_numeric_column(c))
            .map(|c| c.name.clone())
            .collect()
    } else {
        configured_metrics
    };

    if entity_columns.is_empty() {
        return Err(EtlError::Data("aggregate_by_entity: no entity columns resolved".into()));
    }

    let mut order: Vec<Vec<String>> = Vec::new();
    let mut sums: HashMap<Vec<String>, Vec<f64>> = HashMap::new();
    let mut passthrough: HashMap<Vec<String>, Vec<Value>> = HashMap::new();

    let passthrough_columns: Vec<&Column> = payload
        .columns()
        .iter()
        .filter(|c| !entity_columns.contains(&c.name) && !metric_columns.contains(&c.name))
        .collect();

    for row in 0..payload.row_count() {
        let key: Vec<String> = entity_columns
            .iter()
            .map(|name| payload.column(name).unwrap().values[row].stringify())
            .collect();
        if !sums.contains_key(&key) {
            order.push(key.clone());
            sums.insert(key.clone(), vec![0.0; metric_columns.len()]);
            let first_values = passthrough_columns.iter().map(|c| c.values[row].clone()).collect();
            passthrough.insert(key.clone(), first_values);
        }
        let accumulated = sums.get_mut(&key).unwrap();
        for (i, metric) in metric_columns.iter().enumerate() {
            let v = &payload.column(metric).unwrap().values[row];
            accumulated[i] += numeric_value(v);
        }
    }

    let mut columns: Vec<Column> = entity_columns
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.clone(), order.iter().map(|k| Value::Text(k[i].clone())).collect()))
        .collect();
    for (i, name) in metric_columns.iter().enumerate() {
        let values = order.iter().map(|k| Value::Floating(sums[k][i])).collect();
        columns.push(Column::new(name.clone(), values));
    }
    for (i, col) in passthrough_columns.iter().enumerate() {
        let values = order.iter().map(|k| passthrough[k][i].clone()).collect();
        columns.push(Column::new(col.name.clone(), values));
    }
    TabularPayload::new(columns)
}

fn is_numeric_column(column: &Column) -> bool {
    column.values.iter().any(|v| matches!(v, Value::Integer(_) | Value::Floating(_)))
}

fn numeric_value(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Floating(f) => *f,
        _ => 0.0,
    }
}

/// Divides named columns by 1,000,000 — ad-platform "micros" to the natural
/// currency unit.
fn convert_costs(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let mut result = payload.clone();
    for name in param_str_list(params, "columns") {
        let column = require_column(&result, &name)?;
        let values = column
            .values
            .iter()
            .map(|v| Value::Floating(numeric_value(v) / 1_000_000.0))
            .collect();
        result = replace_column(&result, Column::new(name, values))?;
    }
    Ok(result)
}

/// Flattens an array-of-objects JSON column into a long-form table: one
/// output row per `(original row, action)` pair, with `type_field` and
/// `value_field` lifted into their own scalar columns and every other
/// payload column repeated for each action row.
fn extract_nested_actions(payload: &TabularPayload, params: &serde_json::Value) -> Result<TabularPayload, EtlError> {
    let source = param_str(params, "column").unwrap_or("actions");
    let type_field = param_str(params, "type_field").unwrap_or("action_type");
    let value_field = param_str(params, "value_field").unwrap_or("value");

    let column = require_column(payload, source)?;
    let other_columns: Vec<&Column> = payload.columns().iter().filter(|c| c.name != source).collect();

    let mut column_order: Vec<String> = other_columns.iter().map(|c| c.name.clone()).collect();
    column_order.push(type_field.to_string());
    column_order.push(value_field.to_string());

    let mut rows = Vec::new();
    for row_index in 0..payload.row_count() {
        let actions = match &column.values[row_index] {
            Value::Json(serde_json::Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        for action in actions {
            let mut row: Vec<Value> = other_columns.iter().map(|c| c.values[row_index].clone()).collect();
            row.push(action.get(type_field).map(json_to_value).unwrap_or(Value::Null));
            row.push(action.get(value_field).map(json_to_value).unwrap_or(Value::Null));
            rows.push(row);
        }
    }
    TabularPayload::from_rows(column_order, rows)
}
