// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process-wide resource governance, separate from the orchestrator's
//! per-run platform semaphore.
//!
//! The orchestrator bounds how many *platforms* run concurrently
//! (`max_parallel`). Within a single platform's run, table extraction and
//! the in-memory transform steps are still unbounded unless something caps
//! them — on a host running several platforms at once, the fan-out across
//! tables × platforms can oversubscribe both outbound HTTP connections and
//! CPU-bound transform work. `EtlResourceManager` provides the two tokens
//! that cap each, acquired by infrastructure adapters, not by application
//! services.

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Configuration for [`EtlResourceManager`]. `None` fields default to a
/// value derived from the host's CPU count.
#[derive(Debug, Clone, Default)]
pub struct ResourceConfig {
    /// Concurrent CPU-bound transform-step tokens. Default: cores - 1.
    pub cpu_tokens: Option<usize>,
    /// Concurrent outbound extraction-call tokens, shared across every
    /// platform pipeline. Default: cores * 4 (I/O-bound, not CPU-bound).
    pub io_tokens: Option<usize>,
}

/// Two semaphores governing CPU-bound and I/O-bound work across the whole
/// process, independent of the orchestrator's platform-level concurrency
/// cap.
pub struct EtlResourceManager {
    cpu_tokens: Arc<Semaphore>,
    io_tokens: Arc<Semaphore>,
}

impl EtlResourceManager {
    pub fn new(config: ResourceConfig) -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let cpu = config.cpu_tokens.unwrap_or_else(|| cores.saturating_sub(1).max(1));
        let io = config.io_tokens.unwrap_or(cores * 4);
        Self {
            cpu_tokens: Arc::new(Semaphore::new(cpu)),
            io_tokens: Arc::new(Semaphore::new(io)),
        }
    }

    /// Acquires one CPU-bound work token; waits if the process is already
    /// running `cpu_tokens` transform steps concurrently.
    pub async fn acquire_cpu(&self) -> SemaphorePermit<'_> {
        self.cpu_tokens.acquire().await.expect("resource manager semaphore never closed")
    }

    /// Acquires one outbound extraction-call token.
    pub async fn acquire_io(&self) -> SemaphorePermit<'_> {
        self.io_tokens.acquire().await.expect("resource manager semaphore never closed")
    }

    pub fn available_cpu_tokens(&self) -> usize {
        self.cpu_tokens.available_permits()
    }

    pub fn available_io_tokens(&self) -> usize {
        self.io_tokens.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_available_parallelism() {
        let manager = EtlResourceManager::new(ResourceConfig::default());
        assert!(manager.available_cpu_tokens() >= 1);
        assert!(manager.available_io_tokens() >= 4);
    }

    #[tokio::test]
    async fn explicit_token_counts_are_honored() {
        let manager = EtlResourceManager::new(ResourceConfig { cpu_tokens: Some(2), io_tokens: Some(3) });
        assert_eq!(manager.available_cpu_tokens(), 2);
        assert_eq!(manager.available_io_tokens(), 3);

        let _permit = manager.acquire_cpu().await;
        assert_eq!(manager.available_cpu_tokens(), 1);
    }
}
