// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! The run's process exit code, per the orchestrator's stated contract:
//! 0 success, 1 configuration error, 2 partial failure, 3 total failure,
//! 4 orchestrator internal error, 130 user interruption.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// All platforms completed.
    #[default]
    Success = 0,
    /// Malformed config, unknown step/load-mode/platform, or a cycle.
    /// Detected at startup, before any platform runs.
    ConfigError = 1,
    /// A mix of completed/failed/skipped platforms.
    PartialFailure = 2,
    /// No platform completed.
    TotalFailure = 3,
    /// Orchestrator-internal invariant violation.
    Internal = 4,
    /// SIGINT/Ctrl-C.
    Interrupted = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "all platforms completed",
            ExitCode::ConfigError => "configuration error",
            ExitCode::PartialFailure => "partial failure",
            ExitCode::TotalFailure => "total failure",
            ExitCode::Internal => "orchestrator internal error",
            ExitCode::Interrupted => "interrupted by user",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}
