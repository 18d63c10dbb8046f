// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application layer: use cases orchestrate domain ports and application
//! services to satisfy one CLI command each. No infrastructure detail
//! (sqlx, YAML, tracing setup) is named here directly; it all arrives
//! already wired behind `WarehouseSink`/`PlatformPipeline`/config structs.

pub mod services;
pub mod use_cases;
