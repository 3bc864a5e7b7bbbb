//! Field extraction for pipe-delimited contribution records
//!
//! Every record is a single line of `|`-separated fields. Field 7 holds a
//! composite name (`"Last, First Middle"`) and field 13 an eight character
//! date whose first two characters are the month. Extraction is a pure
//! function over the raw line so workers can call it without coordination.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const FIELD_DELIMITER: char = '|';
pub const NAME_FIELD: usize = 7;
pub const DATE_FIELD: usize = 13;
pub const REQUIRED_FIELDS: usize = DATE_FIELD + 1;

/// Month emitted when the date field is not exactly eight characters
pub const UNKNOWN_MONTH: &str = "--";

const NAME_SEPARATOR: &str = ", ";
const DATE_LEN: usize = 8;

/// Values derived from one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub first_name: String,
    pub normalized_full_name: String,
    pub month: String,
}

/// How to derive a first name when the name field has no `", "` separator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstNamePolicy {
    /// Start one character into the name, as historical runs did
    #[default]
    Legacy,
    /// Emit an empty first name
    EmptyWhenMissing,
}

impl FirstNamePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirstNamePolicy::Legacy => "legacy",
            FirstNamePolicy::EmptyWhenMissing => "empty_when_missing",
        }
    }
}

impl fmt::Display for FirstNamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FirstNamePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(FirstNamePolicy::Legacy),
            "empty_when_missing" | "strict" => Ok(FirstNamePolicy::EmptyWhenMissing),
            other => Err(format!("unknown first name policy '{other}'")),
        }
    }
}

/// Extract the first name, normalized full name and month from a raw record
///
/// Records with fewer than [`REQUIRED_FIELDS`] fields are rejected with
/// [`RecordError::Malformed`] instead of being indexed out of bounds.
pub fn extract(record: &str, policy: FirstNamePolicy) -> Result<ExtractedFields, RecordError> {
    let mut fields = record.split(FIELD_DELIMITER);
    let name = fields.nth(NAME_FIELD);
    let date = fields.nth(DATE_FIELD - NAME_FIELD - 1);

    let (Some(name), Some(date)) = (name, date) else {
        return Err(RecordError::Malformed {
            found: record.split(FIELD_DELIMITER).count(),
            required: REQUIRED_FIELDS,
        });
    };

    let name = name.trim();

    Ok(ExtractedFields {
        first_name: first_name(name, policy),
        normalized_full_name: normalize_full_name(name),
        month: month(date).to_string(),
    })
}

/// Remove every whitespace character from an already trimmed name
pub fn normalize_full_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Derive the first name from a trimmed `"Last, First Middle"` value
pub fn first_name(name: &str, policy: FirstNamePolicy) -> String {
    if name.is_empty() {
        return String::new();
    }

    let rest = match name.find(NAME_SEPARATOR) {
        Some(index) => &name[index + NAME_SEPARATOR.len()..],
        None => match policy {
            // A missing separator used to be treated as position -1, so the
            // slice started two past it: one character into the name.
            FirstNamePolicy::Legacy => name
                .char_indices()
                .nth(1)
                .map_or("", |(index, _)| &name[index..]),
            FirstNamePolicy::EmptyWhenMissing => return String::new(),
        },
    };

    let token = match rest.find(char::is_whitespace) {
        Some(end) => &rest[..end],
        None => rest,
    };

    if token.ends_with(',') {
        token.replace(',', "")
    } else {
        token.to_string()
    }
}

/// Month part of a date field, or [`UNKNOWN_MONTH`]
pub fn month(date: &str) -> &str {
    let date = date.trim();
    if date.len() == DATE_LEN {
        date.get(..2).unwrap_or(UNKNOWN_MONTH)
    } else {
        UNKNOWN_MONTH
    }
}
