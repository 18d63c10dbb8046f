// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A named platform: its table configurations and its dependency list.

use crate::{EtlError, RetryPolicy, TableConfig};
use serde::{Deserialize, Serialize};

/// A platform owns a list of table configurations and a list of other
/// platform names that must complete before it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
    pub tables: Vec<TableConfig>,
}

fn default_true() -> bool {
    true
}

impl PlatformConfig {
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.name.trim().is_empty() {
            return Err(EtlError::Config("platform name must not be empty".into()));
        }
        if self.depends_on.iter().any(|d| d == &self.name) {
            return Err(EtlError::Config(format!(
                "platform '{}' declares itself as a dependency",
                self.name
            )));
        }
        for table in &self.tables {
            table.validate()?;
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Topological order of this platform's own tables (value-level
    /// dependencies via `depends_on_table`), root tables first.
    pub fn table_execution_order(&self) -> Result<Vec<&TableConfig>, EtlError> {
        let mut remaining: Vec<&TableConfig> = self.tables.iter().collect();
        let mut ordered: Vec<&TableConfig> = Vec::with_capacity(remaining.len());
        let mut done = std::collections::HashSet::new();

        while !remaining.is_empty() {
            let (ready, not_ready): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|t| {
                t.depends_on_table
                    .as_ref()
                    .map(|dep| done.contains(dep.as_str()))
                    .unwrap_or(true)
            });
            if ready.is_empty() {
                let cycle = not_ready.iter().map(|t| t.name.clone()).collect();
                return Err(EtlError::CircularDependency(cycle));
            }
            for t in &ready {
                done.insert(t.name.as_str());
            }
            ordered.extend(ready);
            remaining = not_ready;
        }
        Ok(ordered)
    }
}
