// /////////////////////////////////////////////////////////////////////////////
// Ads ETL Core
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bulk-copy row format: a pure function of `(payload, schema)`, used by the
//! warehouse sink's `COPY ... FROM STDIN` append path.
//!
//! One row per line, columns separated by a single-byte delimiter chosen
//! because it cannot appear in any string field once escaped. Nulls are
//! written as a sentinel that cannot collide with a real (escaped) value.
//! Numbers are emitted with `.` as the decimal separator and no thousands
//! grouping, regardless of host locale.

use crate::{EtlError, TabularPayload, Value};

/// Column delimiter. Chosen over comma/tab because it is vanishingly rare
/// in ad-platform text fields (campaign names, ad copy) and is therefore
/// cheap to escape.
pub const DELIMITER: char = '\x01';
/// Sentinel written for a null cell. Not a valid encoding of any escaped
/// string, since `\x02` is itself escaped before being written (see
/// `escape`).
pub const NULL_SENTINEL: &str = "\\N";
const ESCAPE: char = '\\';
const NEWLINE: char = '\n';

/// Encodes `payload` as bulk-copy text, one line per row, columns in
/// `payload`'s own order (the caller aligns to schema order beforehand).
pub fn encode(payload: &TabularPayload) -> String {
    let mut out = String::new();
    for row in payload.rows() {
        for (i, (_, value)) in row.iter().enumerate() {
            if i > 0 {
                out.push(DELIMITER);
            }
            out.push_str(&encode_value(value));
        }
        out.push(NEWLINE);
    }
    out
}

fn encode_value(value: &Value) -> String {
    if value.is_null() {
        return NULL_SENTINEL.to_string();
    }
    escape(&value.stringify())
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            DELIMITER | ESCAPE | NEWLINE | '\r' => {
                out.push(ESCAPE);
                out.push(match ch {
                    NEWLINE => 'n',
                    '\r' => 'r',
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    out
}

/// Decodes bulk-copy text back into rows of raw strings (one `Vec<String>`
/// per row, `None` standing in for a null cell), the inverse of `encode`
/// modulo type information (the caller re-aligns against a schema to
/// recover typed `Value`s).
pub fn decode(text: &str) -> Result<Vec<Vec<Option<String>>>, EtlError> {
    let mut rows = Vec::new();
    for line in text.split(NEWLINE) {
        if line.is_empty() {
            continue;
        }
        rows.push(decode_line(line)?);
    }
    Ok(rows)
}

fn decode_line(line: &str) -> Result<Vec<Option<String>>, EtlError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => match chars.next() {
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                Some(other) => current.push(other),
                None => {
                    return Err(EtlError::Data("bulk format: trailing escape character".into()));
                }
            },
            DELIMITER => {
                fields.push(current.clone());
                current.clear();
            }
            other => current.push(other),
        }
    }
    fields.push(current);
    Ok(fields
        .into_iter()
        .map(|f| if f == NULL_SENTINEL { None } else { Some(f) })
        .collect())
}
