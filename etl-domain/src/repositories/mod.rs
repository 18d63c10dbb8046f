// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain ports: the interfaces infrastructure adapters implement and
//! application services depend on, never the other way around.

pub mod platform_extractor;
pub mod token_provider;
pub mod warehouse_sink;

pub use platform_extractor::{DriverKeys, PlatformExtractor};
pub use token_provider::{Token, TokenProvider};
pub use warehouse_sink::{LoadOutcome, WarehouseSink};
