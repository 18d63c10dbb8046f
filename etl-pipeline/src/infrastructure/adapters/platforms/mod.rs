// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! One module per supported platform, each a thin [`super::PlatformCatalog`]
//! factory over the shared `GenericPlatformPipeline`. Nothing here makes a
//! real HTTP or SDK call — the `PlatformExtractor` each catalog is paired
//! with at wiring time is an external collaborator, out of scope for this
//! crate.

pub mod facebook;
pub mod google_ads;
pub mod linkedin;
pub mod microsoft_ads;

use super::PlatformCatalog;

/// Looks up a platform's built-in catalog (driver-key wiring, test-mode
/// suffix) by name. The operator-supplied platform config directory still
/// owns each table's own declaration (load mode, pk/increment columns,
/// processing steps); the caller overlays it onto `catalog.config` after
/// loading it.
pub fn builtin_catalog(name: &str) -> Option<PlatformCatalog> {
    match name {
        "linkedin" => Some(linkedin::catalog()),
        "facebook" => Some(facebook::catalog()),
        "google_ads" => Some(google_ads::catalog()),
        "microsoft_ads" => Some(microsoft_ads::catalog()),
        _ => None,
    }
}
