// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ETL Pipeline
//!
//! The application and infrastructure layers of the multi-platform
//! advertising ETL core: the orchestrator, scheduler, processing pipeline,
//! and execution monitor (`application`), and their concrete adapters —
//! Postgres warehouse sink, platform catalogs, config loading, logging,
//! metrics, and concurrency governance (`infrastructure`).
//!
//! Depends on `etl-domain` for every port and value type; depended on by
//! `etl-bootstrap`'s binary, never the reverse.

pub mod application;
pub mod infrastructure;
