// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure layer: adapters for the domain's ports (Postgres warehouse
//! sink, generic platform pipeline, platform catalogs), configuration
//! loading, logging setup, Prometheus metrics, and process-wide
//! concurrency governance.

pub mod adapters;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod runtime;
