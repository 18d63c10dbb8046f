// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ETL Domain
//!
//! Pure, reusable business logic for the multi-platform advertising ETL
//! core: the tabular payload, platform/table configuration, load-mode
//! semantics, and the infrastructure-facing ports (`WarehouseSink`,
//! `PlatformExtractor`, `TokenProvider`) that the application layer and
//! infrastructure adapters in `etl-pipeline` depend on.
//!
//! Following Domain-Driven Design, this crate has no knowledge of tokio,
//! sqlx, or tracing — it is the layer every other crate depends on, never
//! the reverse.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::{Column, PlatformConfig, ProcessingStepConfig, TableConfig, TabularPayload};
pub use error::{EtlError, TransportError};
pub use repositories::{DriverKeys, LoadOutcome, PlatformExtractor, Token, TokenProvider, WarehouseSink};
pub use services::{align, AlignmentReport};
pub use value_objects::{ColumnSchema, ColumnType, DateRange, LoadMode, RetryPolicy, TableSchema, Value};
