// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Type alignment: coerces a payload's columns to a target schema's
//! declared types and column order before any warehouse write.
//!
//! This runs before every load (append/replace/upsert/increment alike).
//! Payload columns absent from the schema are dropped with a warning;
//! schema columns absent from the payload are filled with typed defaults.
//! The result is idempotent: aligning an already-aligned payload against
//! the same schema is a no-op.

use crate::{Column, ColumnType, EtlError, TableSchema, TabularPayload, Value};
use chrono::{DateTime, NaiveDate, Utc};

/// Names of payload columns that were dropped because the schema doesn't
/// declare them, surfaced so the caller can log a warning.
pub struct AlignmentReport {
    pub dropped_columns: Vec<String>,
    pub defaulted_columns: Vec<String>,
}

/// Aligns `payload` to `schema`: coerces types, drops unknown columns,
/// fills missing columns with typed defaults, and reorders to schema
/// order.
pub fn align(payload: &TabularPayload, schema: &TableSchema) -> Result<(TabularPayload, AlignmentReport), EtlError> {
    let row_count = payload.row_count();
    let dropped_columns: Vec<String> = payload
        .column_names()
        .into_iter()
        .filter(|name| !schema.contains(name))
        .map(String::from)
        .collect();

    let mut defaulted_columns = Vec::new();
    let mut columns = Vec::with_capacity(schema.columns.len());

    for col_schema in &schema.columns {
        let aligned = match payload.column(&col_schema.name) {
            Some(col) => align_column(col, col_schema.column_type)?,
            None => {
                defaulted_columns.push(col_schema.name.clone());
                Column::new(col_schema.name.clone(), vec![default_for(col_schema.column_type); row_count])
            }
        };
        columns.push(aligned);
    }

    let aligned_payload = TabularPayload::new(columns)?;
    Ok((
        aligned_payload,
        AlignmentReport {
            dropped_columns,
            defaulted_columns,
        },
    ))
}

fn default_for(column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::Integer => Value::Integer(0),
        ColumnType::Floating => Value::Floating(0.0),
        ColumnType::String => Value::Null,
        ColumnType::Date => Value::Null,
        ColumnType::Timestamp => Value::Null,
        ColumnType::Boolean => Value::Null,
        ColumnType::Null => Value::Null,
    }
}

fn align_column(column: &Column, target: ColumnType) -> Result<Column, EtlError> {
    let values = column
        .values
        .iter()
        .map(|v| align_value(v, target, &column.name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Column::new(column.name.clone(), values))
}

fn align_value(value: &Value, target: ColumnType, column_name: &str) -> Result<Value, EtlError> {
    if value.is_nan_like() && matches!(target, ColumnType::Integer | ColumnType::Floating) {
        return Ok(match target {
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Floating => Value::Floating(0.0),
            _ => unreachable!(),
        });
    }
    match target {
        ColumnType::Integer => Ok(Value::Integer(coerce_integer(value, column_name)?)),
        ColumnType::Floating => Ok(Value::Floating(coerce_floating(value, column_name)?)),
        ColumnType::Boolean => Ok(coerce_boolean(value)),
        ColumnType::Date => Ok(coerce_date(value)),
        ColumnType::Timestamp => Ok(coerce_timestamp(value)),
        ColumnType::String => Ok(coerce_string(value)),
        ColumnType::Null => Ok(Value::Null),
    }
}

fn coerce_integer(value: &Value, column_name: &str) -> Result<i64, EtlError> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Floating(f) => Ok(*f as i64),
        Value::Boolean(b) => Ok(*b as i64),
        Value::Text(s) => s.trim().parse::<i64>().or_else(|_| s.trim().parse::<f64>().map(|f| f as i64)).map_err(
            |_| EtlError::SchemaMismatch {
                column: column_name.into(),
                reason: format!("cannot coerce '{s}' to integer"),
            },
        ),
        Value::Null => Ok(0),
        other => Err(EtlError::SchemaMismatch {
            column: column_name.into(),
            reason: format!("cannot coerce {other:?} to integer"),
        }),
    }
}

fn coerce_floating(value: &Value, column_name: &str) -> Result<f64, EtlError> {
    match value {
        Value::Floating(f) => Ok(*f),
        Value::Integer(i) => Ok(*i as f64),
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| EtlError::SchemaMismatch {
            column: column_name.into(),
            reason: format!("cannot coerce '{s}' to floating"),
        }),
        Value::Null => Ok(0.0),
        other => Err(EtlError::SchemaMismatch {
            column: column_name.into(),
            reason: format!("cannot coerce {other:?} to floating"),
        }),
    }
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Boolean(b) => Value::Boolean(*b),
        Value::Integer(i) => Value::Boolean(*i != 0),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Value::Boolean(true),
            "false" | "f" | "0" | "no" => Value::Boolean(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

fn coerce_date(value: &Value) -> Value {
    match value {
        Value::Date(d) => Value::Date(*d),
        Value::Timestamp(t) => Value::Date(t.date_naive()),
        Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .or_else(|_| s.parse::<DateTime<Utc>>().map(|t| Value::Date(t.date_naive())))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn coerce_timestamp(value: &Value) -> Value {
    match value {
        Value::Timestamp(t) => Value::Timestamp(*t),
        Value::Date(d) => Value::Timestamp(d.and_hms_opt(0, 0, 0).unwrap().and_utc()),
        Value::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<DateTime<Utc>>()
                .or_else(|_| chrono::DateTime::parse_from_rfc3339(trimmed).map(|t| t.with_timezone(&Utc)))
                .map(Value::Timestamp)
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn coerce_string(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::Text(other.stringify()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnSchema;

    fn schema() -> TableSchema {
        TableSchema {
            columns: vec![
                ColumnSchema {
                    name: "id".into(),
                    column_type: ColumnType::Integer,
                    nullable: false,
                },
                ColumnSchema {
                    name: "clicks".into(),
                    column_type: ColumnType::Integer,
                    nullable: false,
                },
                ColumnSchema {
                    name: "label".into(),
                    column_type: ColumnType::String,
                    nullable: true,
                },
            ],
        }
    }

    #[test]
    fn nan_and_empty_become_zero_for_numeric_targets() {
        let payload = TabularPayload::new(vec![
            Column::new("id", vec![Value::Integer(1)]),
            Column::new("clicks", vec![Value::Text("nan".into())]),
        ])
        .unwrap();
        let (aligned, _) = align(&payload, &schema()).unwrap();
        assert_eq!(aligned.column("clicks").unwrap().values[0], Value::Integer(0));
    }

    #[test]
    fn missing_schema_columns_get_typed_defaults() {
        let payload = TabularPayload::new(vec![Column::new("id", vec![Value::Integer(1)])]).unwrap();
        let (aligned, report) = align(&payload, &schema()).unwrap();
        assert_eq!(aligned.column("clicks").unwrap().values[0], Value::Integer(0));
        assert_eq!(aligned.column("label").unwrap().values[0], Value::Null);
        assert_eq!(report.defaulted_columns, vec!["clicks", "label"]);
    }

    #[test]
    fn unknown_payload_columns_are_dropped() {
        let payload = TabularPayload::new(vec![
            Column::new("id", vec![Value::Integer(1)]),
            Column::new("clicks", vec![Value::Integer(2)]),
            Column::new("mystery", vec![Value::Text("x".into())]),
        ])
        .unwrap();
        let (aligned, report) = align(&payload, &schema()).unwrap();
        assert!(aligned.column("mystery").is_none());
        assert_eq!(report.dropped_columns, vec!["mystery"]);
    }

    #[test]
    fn reorders_columns_to_schema_order() {
        let payload = TabularPayload::new(vec![
            Column::new("clicks", vec![Value::Integer(2)]),
            Column::new("id", vec![Value::Integer(1)]),
        ])
        .unwrap();
        let (aligned, _) = align(&payload, &schema()).unwrap();
        assert_eq!(aligned.column_names(), vec!["id", "clicks", "label"]);
    }

    #[test]
    fn alignment_is_idempotent() {
        let payload = TabularPayload::new(vec![
            Column::new("id", vec![Value::Text("7".into())]),
            Column::new("clicks", vec![Value::Text("3.0".into())]),
        ])
        .unwrap();
        let (once, _) = align(&payload, &schema()).unwrap();
        let (twice, _) = align(&once, &schema()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn uncoercible_value_fails_the_whole_load() {
        let payload = TabularPayload::new(vec![
            Column::new("id", vec![Value::Integer(1)]),
            Column::new("clicks", vec![Value::Text("not-a-number".into())]),
        ])
        .unwrap();
        assert!(align(&payload, &schema()).is_err());
    }
}
