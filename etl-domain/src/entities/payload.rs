// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The tabular payload: the in-memory shape every pipeline stage operates
//! on, from extraction through transformation to bulk load.

use crate::{EtlError, Value};
use std::collections::HashSet;

/// A single named column with its values, one per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self { name: name.into(), values }
    }
}

/// An ordered sequence of named columns, stored column-major. Rows are
/// positional: row `i` is `(columns[0].values[i], columns[1].values[i], ...)`.
/// Column order is not externally significant except that it must be
/// preserved end-to-end for bulk-load formatting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularPayload {
    columns: Vec<Column>,
}

impl TabularPayload {
    pub fn new(columns: Vec<Column>) -> Result<Self, EtlError> {
        let row_count = columns.first().map(|c| c.values.len());
        if let Some(expected) = row_count {
            if columns.iter().any(|c| c.values.len() != expected) {
                return Err(EtlError::Data(
                    "all columns in a payload must have the same row count".into(),
                ));
            }
        }
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(EtlError::Data(format!("duplicate column name: {}", c.name)));
            }
        }
        Ok(Self { columns })
    }

    pub fn empty() -> Self {
        Self { columns: Vec::new() }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Row-oriented view for callers (processing steps, tests) that find it
    /// more natural than columnar access. `row(i)` returns `(column_name,
    /// value)` pairs in column order.
    pub fn row(&self, index: usize) -> Vec<(&str, &Value)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), &c.values[index]))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<(&str, &Value)>> {
        (0..self.row_count()).map(move |i| self.row(i))
    }

    /// Builds a payload from row-oriented data, inferring column order from
    /// the first row. Used by processing steps that naturally produce rows
    /// (e.g. flattening nested actions).
    pub fn from_rows(column_order: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, EtlError> {
        let mut columns: Vec<Column> = column_order
            .iter()
            .map(|name| Column::new(name.clone(), Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            if row.len() != columns.len() {
                return Err(EtlError::Data(format!(
                    "row has {} values but {} columns were declared",
                    row.len(),
                    columns.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row.into_iter()) {
                col.values.push(value);
            }
        }
        TabularPayload::new(columns)
    }
}
