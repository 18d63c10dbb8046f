// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-table configuration declared by a platform: processing chain,
//! load mode, and identity columns.

use crate::{EtlError, LoadMode};
use serde::{Deserialize, Serialize};

/// One `(step_name, parameters)` entry in a table's processing chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStepConfig {
    pub step_name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A logical table owned by a platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub processing: Vec<ProcessingStepConfig>,
    pub load_mode: LoadMode,
    #[serde(default)]
    pub pk_columns: Vec<String>,
    #[serde(default)]
    pub increment_columns: Vec<String>,
    #[serde(default)]
    pub test_mode_suffix: bool,
    /// Value-level dependency: another table in the same platform whose
    /// driver keys (e.g. campaign ids) parameterize this table's
    /// extraction. `None` for root tables.
    #[serde(default)]
    pub depends_on_table: Option<String>,
    /// When true, a failure loading this table aborts the whole platform
    /// rather than being recorded and skipped.
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl TableConfig {
    /// Validates the declarative invariants that must hold regardless of
    /// runtime data: increment mode may not key on a date column, and
    /// upsert/increment require at least one pk column.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.load_mode.requires_pk() && self.pk_columns.is_empty() {
            return Err(EtlError::Config(format!(
                "table '{}' uses load_mode={} but declares no pk_columns",
                self.name, self.load_mode
            )));
        }
        if self.load_mode == LoadMode::Increment && self.increment_columns.is_empty() {
            return Err(EtlError::Config(format!(
                "table '{}' uses load_mode=increment but declares no increment_columns",
                self.name
            )));
        }
        if self.load_mode == LoadMode::Increment {
            if let Some(date_col) = self.pk_columns.iter().find(|c| looks_like_a_date_column(c)) {
                return Err(EtlError::Config(format!(
                    "table '{}' uses load_mode=increment but declares date-like pk column '{date_col}' \
                     — increment mode accumulates per entity over its lifetime, not per day",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// The table name to target for this run, honoring test-mode suffixing.
    pub fn target_table_name(&self, test_mode: bool, suffix: &str) -> String {
        if test_mode && self.test_mode_suffix {
            format!("{}{}", self.name, suffix)
        } else {
            self.name.clone()
        }
    }
}

fn looks_like_a_date_column(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "date" || lower == "day" || lower.ends_with("_date") || lower.ends_with("_day")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(load_mode: LoadMode) -> TableConfig {
        TableConfig {
            name: "insights".into(),
            processing: vec![],
            load_mode,
            pk_columns: vec![],
            increment_columns: vec![],
            test_mode_suffix: true,
            depends_on_table: None,
            stop_on_failure: false,
        }
    }

    #[test]
    fn upsert_requires_pk() {
        assert!(base(LoadMode::Upsert).validate().is_err());
    }

    #[test]
    fn increment_requires_pk_and_increment_columns() {
        let mut table = base(LoadMode::Increment);
        table.pk_columns = vec!["creative_id".into()];
        assert!(table.validate().is_err());
        table.increment_columns = vec!["impressions".into()];
        assert!(table.validate().is_ok());
    }

    #[test]
    fn increment_rejects_a_date_like_pk_column() {
        let mut table = base(LoadMode::Increment);
        table.pk_columns = vec!["campaign_id".into(), "date".into()];
        table.increment_columns = vec!["impressions".into()];
        assert!(table.validate().is_err());

        table.pk_columns = vec!["campaign_id".into(), "report_day".into()];
        assert!(table.validate().is_err());

        table.pk_columns = vec!["campaign_id".into()];
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_mode_suffix_applies_only_when_flagged() {
        let mut table = base(LoadMode::Append);
        assert_eq!(table.target_table_name(true, "_test"), "insights_test");
        table.test_mode_suffix = false;
        assert_eq!(table.target_table_name(true, "_test"), "insights");
    }
}
