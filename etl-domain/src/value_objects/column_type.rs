// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Column semantic types and the in-memory cell representation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic type a warehouse column is declared to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Floating,
    Boolean,
    Date,
    Timestamp,
    Null,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Floating => "floating",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Null => "null",
        };
        write!(f, "{s}")
    }
}

/// A single cell value. Payload columns carry a homogeneous `Value` variant
/// per declared type, but a column may mix any variant with `Null` before
/// type alignment has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Integer(i64),
    Floating(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// A transient nested structure produced by a response-decoration or
    /// nested-action step before it is flattened to scalar columns. Never
    /// valid on a column that reaches the warehouse sink.
    Json(serde_json::Value),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for the sentinel textual values that type alignment treats as
    /// null/zero: empty string, "nan", "NaN".
    pub fn is_nan_like(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
            }
            Value::Floating(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Best-effort textual rendering, used by the string-target alignment
    /// path and by the bulk-format encoder.
    pub fn stringify(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Floating(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(t) => t.to_rfc3339(),
            Value::Json(j) => j.to_string(),
            Value::Null => String::new(),
        }
    }
}
