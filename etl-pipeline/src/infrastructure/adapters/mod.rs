// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete adapters for the domain's ports: the Postgres warehouse sink and
//! the generic platform pipeline, plus the four platform catalogs.

pub mod platform_pipeline;
pub mod platforms;
pub mod unimplemented_extractor;
pub mod warehouse_sink;

pub use platform_pipeline::{GenericPlatformPipeline, PlatformCatalog};
pub use platforms::builtin_catalog;
pub use unimplemented_extractor::UnimplementedExtractor;
pub use warehouse_sink::PostgresWarehouseSink;
