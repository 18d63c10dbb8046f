// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for per-platform authentication token retrieval and refresh.

use crate::EtlError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// An access token cached in memory, with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Whether this token is within `buffer` of expiry (or already expired)
    /// as of `now`, and should be refreshed before use.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        self.expires_at - now <= buffer
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, platform: &str) -> Result<Token, EtlError>;
    async fn refresh(&self, platform: &str) -> Result<Token, EtlError>;
}
