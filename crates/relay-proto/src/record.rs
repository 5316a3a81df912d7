//! Inbound records.
//!
//! A record is any JSON object received from a client. Validation happens in
//! the server; this module only offers the typed accessors it needs.

use serde_json::{Map, Value};

/// A flat key-value payload as received from the wire.
pub type Record = Map<String, Value>;

/// Return the field as `&str` only when it is present and a JSON string.
///
/// `null`, numbers, arrays and objects all yield `None`.
#[inline]
pub fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Check whether the record's `type` field is a string equal to `expected`,
/// ignoring case.
pub fn is_type(record: &Record, expected: &str) -> bool {
    str_field(record, "type").is_some_and(|t| crate::text::names_eq(t, expected))
}
