// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error type for the ETL core, organized around the
//! error kinds named in the system design: configuration, auth, transport,
//! data, dependency, and fatal failures. Each variant carries enough context
//! to log and to decide retryability without downcasting.

use thiserror::Error;

/// Domain-specific errors for the ETL core.
#[derive(Error, Debug, Clone)]
pub enum EtlError {
    /// Malformed config, unknown step/load-mode/platform, circular
    /// dependency, or a conflicting `parallel_groups`/`depends_on`
    /// declaration. Detected at startup, never retryable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Token missing or refresh failed.
    #[error("authentication error for platform {platform}: {reason}")]
    Auth { platform: String, reason: String },

    /// Network timeout, connection reset, HTTP 5xx, or rate limiting.
    /// Retryable per the platform's retry policy.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Type-alignment failure, invalid payload shape, or constraint
    /// violation. Not retryable; fails the current table load.
    #[error("data error: {0}")]
    Data(String),

    /// A schema-level mismatch that cannot be coerced.
    #[error("schema mismatch on column '{column}': {reason}")]
    SchemaMismatch { column: String, reason: String },

    /// pk_columns missing when required by the load mode.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Warehouse connection could not be established or was lost mid-load.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// A unique/foreign-key constraint was violated by the target warehouse.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A driver-key query returned empty, or the dependency platform/table
    /// is in a failed or skipped state.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// A processing step name is not registered.
    #[error("unknown processing step: {0}")]
    UnknownStep(String),

    /// A registered step failed while processing a payload.
    #[error("step '{step}' failed: {cause}")]
    StepFailed { step: String, cause: String },

    /// Scheduler detected a cycle in the platform dependency graph.
    #[error("circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),

    /// Orchestrator-internal invariant violation. Aborts the run.
    #[error("fatal error: {0}")]
    Fatal(String),
}

/// Sub-kinds of [`EtlError::Transport`], distinguished because only
/// `RateLimited` carries a server-provided retry hint.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Timeout(String),
    ConnectionReset(String),
    ServerError { status: u16, message: String },
    RateLimited { retry_after_secs: Option<u64> },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout(msg) => write!(f, "timeout: {msg}"),
            TransportError::ConnectionReset(msg) => write!(f, "connection reset: {msg}"),
            TransportError::ServerError { status, message } => {
                write!(f, "server error {status}: {message}")
            }
            TransportError::RateLimited { retry_after_secs } => match retry_after_secs {
                Some(secs) => write!(f, "rate limited, retry after {secs}s"),
                None => write!(f, "rate limited"),
            },
        }
    }
}

impl EtlError {
    /// Whether a retry loop should attempt this error again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EtlError::Transport(_) | EtlError::ConnectionFailure(_))
    }

    /// A server-supplied retry delay, when the error carries one.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            EtlError::Transport(TransportError::RateLimited {
                retry_after_secs: Some(secs),
            }) => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Coarse category used for metrics labels and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            EtlError::Config(_) => "config",
            EtlError::Auth { .. } => "auth",
            EtlError::Transport(_) => "transport",
            EtlError::Data(_) => "data",
            EtlError::SchemaMismatch { .. } => "data",
            EtlError::Integrity(_) => "data",
            EtlError::ConnectionFailure(_) => "transport",
            EtlError::ConstraintViolation(_) => "data",
            EtlError::Dependency(_) => "dependency",
            EtlError::UnknownStep(_) => "config",
            EtlError::StepFailed { .. } => "data",
            EtlError::CircularDependency(_) => "config",
            EtlError::Fatal(_) => "fatal",
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::Data(format!("serialization error: {err}"))
    }
}

impl From<chrono::ParseError> for EtlError {
    fn from(err: chrono::ParseError) -> Self {
        EtlError::Data(format!("date/time parse error: {err}"))
    }
}
