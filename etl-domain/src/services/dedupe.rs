// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pure dedupe arithmetic for append+pk loads: given the set of pk tuples
//! already present in the target, filter a payload down to genuinely new
//! rows. The warehouse-facing half (reading the existing set, or pushing
//! the anti-join into the warehouse above a size threshold) lives in the
//! infrastructure adapter; this module is the part with no I/O.

use crate::{Column, EtlError, TabularPayload, Value};
use std::collections::HashSet;

/// A pk tuple rendered to its stable string form for set membership.
pub type PkKey = Vec<String>;

/// Builds the pk key for every row in `payload`, in row order.
pub fn pk_keys(payload: &TabularPayload, pk_columns: &[String]) -> Result<Vec<PkKey>, EtlError> {
    let columns: Vec<&Column> = pk_columns
        .iter()
        .map(|name| {
            payload
                .column(name)
                .ok_or_else(|| EtlError::Integrity(format!("pk column '{name}' missing from payload")))
        })
        .collect::<Result<_, _>>()?;

    Ok((0..payload.row_count())
        .map(|row| columns.iter().map(|c| pk_component(&c.values[row])).collect())
        .collect())
}

fn pk_component(value: &Value) -> String {
    value.stringify()
}

/// Keeps only the rows of `payload` whose pk key is not in `existing`.
/// Row order is preserved among the surviving rows.
pub fn filter_new_rows(
    payload: &TabularPayload,
    pk_columns: &[String],
    existing: &HashSet<PkKey>,
) -> Result<TabularPayload, EtlError> {
    let keys = pk_keys(payload, pk_columns)?;
    let keep: Vec<bool> = keys.iter().map(|k| !existing.contains(k)).collect();

    let columns = payload
        .columns()
        .iter()
        .map(|col| {
            let values = col
                .values
                .iter()
                .zip(keep.iter())
                .filter_map(|(v, &k)| k.then(|| v.clone()))
                .collect();
            Column::new(col.name.clone(), values)
        })
        .collect();

    TabularPayload::new(columns)
}
