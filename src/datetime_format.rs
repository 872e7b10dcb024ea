//! Specifies how dates and timestamps are parsed from and written to JSON.
//!
//! Dates are calendar dates in the strict format "YYYY-MM-DD" and timestamps are
//! RFC 3339 strings, e.g. "2024-01-15T09:30:00Z".

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::Error;

/// Date format for transaction dates, e.g. "2024-01-15".
pub const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Parse a calendar date in the strict format "YYYY-MM-DD".
///
/// The year must have exactly four digits and the month and day exactly two
/// digits each. The date must also exist, so "2024-02-30" and "2024-13-40" are
/// rejected.
///
/// # Errors
/// Returns [Error::InvalidDate] if `text` is not a valid date in this format.
pub fn parse_date(text: &str) -> Result<Date, Error> {
    let bytes = text.as_bytes();
    let has_date_shape = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, byte)| match i {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });

    if !has_date_shape {
        return Err(Error::InvalidDate(text.to_owned()));
    }

    Date::parse(text, DATE_FORMAT).map_err(|_| Error::InvalidDate(text.to_owned()))
}

/// Serialize a [time::Date] as "YYYY-MM-DD".
pub mod date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    use super::{DATE_FORMAT, parse_date};

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = date.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_date(&s).map_err(serde::de::Error::custom)
    }
}

/// Serialize a [time::OffsetDateTime] as an RFC 3339 timestamp.
pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    pub fn serialize<S>(dt: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = dt.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
    }
}
