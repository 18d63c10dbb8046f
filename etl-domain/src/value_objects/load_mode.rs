// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Load-mode strategy for combining a payload into a warehouse target table.

use crate::EtlError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Strategy for combining a payload into a target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Insert new rows; optionally dedupe against existing pk tuples.
    Append,
    /// Truncate then append (no dedupe).
    Replace,
    /// Insert or replace matched rows by pk; non-pk columns take the
    /// payload's value unconditionally.
    Upsert,
    /// Insert new keys; add `increment_columns` to the existing stored
    /// value for matched keys.
    Increment,
}

impl LoadMode {
    /// Whether this mode requires pk_columns to be non-empty.
    pub fn requires_pk(&self) -> bool {
        matches!(self, LoadMode::Upsert | LoadMode::Increment)
    }
}

impl FromStr for LoadMode {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(LoadMode::Append),
            "replace" => Ok(LoadMode::Replace),
            "upsert" => Ok(LoadMode::Upsert),
            "increment" => Ok(LoadMode::Increment),
            other => Err(EtlError::Config(format!("unknown load_mode: {other}"))),
        }
    }
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadMode::Append => "append",
            LoadMode::Replace => "replace",
            LoadMode::Upsert => "upsert",
            LoadMode::Increment => "increment",
        };
        write!(f, "{s}")
    }
}

/// Exponential backoff policy with a cap, shared by per-platform retry
/// configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_seconds: 1,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 60,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep before the given 1-indexed attempt number (the delay
    /// preceding attempt 2 is `backoff_seconds`, attempt 3 is
    /// `backoff_seconds * backoff_multiplier`, etc.), capped at
    /// `max_backoff_seconds`.
    pub fn delay_before_attempt(&self, attempt: u32) -> std::time::Duration {
        debug_assert!(attempt >= 2, "no delay precedes the first attempt");
        let retry_index = (attempt - 2) as i32;
        let raw = self.backoff_seconds as f64 * self.backoff_multiplier.powi(retry_index);
        let capped = raw.min(self.max_backoff_seconds as f64).max(0.0);
        std::time::Duration::from_secs_f64(capped)
    }
}
