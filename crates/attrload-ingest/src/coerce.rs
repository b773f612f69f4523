//! Raw string to typed value coercion
//!
//! [`coerce`] is total: every input maps to a typed value or to "absent", and
//! nothing in here returns an error or panics. The policy, in order:
//!
//! 1. Temporal columns: all-digit input is taken as an epoch value directly,
//!    anything else is parsed with the configured date format and zone into
//!    epoch milliseconds. Unparsable dates are dropped.
//! 2. Numeric columns: parsed in the column's width, defaulting to zero.
//!    NaN and infinities (spelled out or overflowed) also become zero.
//! 3. Everything else: non-blank strings are kept verbatim, blank is dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

use crate::schema::{ColumnDefinition, ColumnType};

/// A value ready to be written to the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Double(f64),
    Float(f32),
    Integer(i32),
    Long(i64),
    String(String),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Double(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Integer(v) => write!(f, "{}", v),
            TypedValue::Long(v) => write!(f, "{}", v),
            TypedValue::String(v) => f.write_str(v),
        }
    }
}

/// Zone used to resolve date-times that carry no offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The host's local zone
    #[default]
    Local,
    Named(Tz),
}

impl Zone {
    /// Parse an IANA name or abbreviation such as `America/New_York` or `EST`
    pub fn parse(id: &str) -> Option<Self> {
        id.trim().parse::<Tz>().ok().map(Zone::Named)
    }

    /// Epoch milliseconds of a local date-time, earliest instant on ambiguity
    fn epoch_millis(&self, naive: &NaiveDateTime) -> Option<i64> {
        match self {
            Zone::Local => chrono::Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.timestamp_millis()),
            Zone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.timestamp_millis()),
        }
    }
}

/// Date parsing settings shared by all temporal columns of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporalSettings {
    /// strftime pattern; `None` means RFC 3339
    date_format: Option<String>,
    zone: Zone,
}

impl TemporalSettings {
    /// `date_format` may be strftime (`%Y-%m-%d`) or a Java-style pattern
    /// (`yyyy/MM/dd HH:mm:ss`); the latter is translated.
    pub fn new(date_format: Option<&str>, zone: Zone) -> Self {
        let date_format = date_format
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| {
                if f.contains('%') {
                    f.to_string()
                } else {
                    java_pattern_to_strftime(f)
                }
            });
        Self { date_format, zone }
    }

    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Epoch milliseconds for a formatted date, `None` when it does not parse
    pub fn parse_epoch_millis(&self, raw: &str) -> Option<i64> {
        let raw = raw.trim();
        let Some(format) = self.date_format.as_deref() else {
            return DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.timestamp_millis());
        };

        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.timestamp_millis());
        }

        let naive = NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

        self.zone.epoch_millis(&naive)
    }
}

/// Coerce one raw attribute value for `column`. `None` means the field is
/// omitted from the record.
pub fn coerce(
    raw: Option<&str>,
    column: &ColumnDefinition,
    temporal: &TemporalSettings,
) -> Option<TypedValue> {
    let raw = raw?;

    if column.is_temporal() {
        return if is_all_digits(raw) {
            Some(TypedValue::Long(raw.parse().unwrap_or(0)))
        } else {
            temporal.parse_epoch_millis(raw).map(TypedValue::Long)
        };
    }

    // Floating input tolerates surrounding whitespace, integer input does not
    let trimmed = raw.trim();
    match column.column_type {
        ColumnType::Double => Some(TypedValue::Double(
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        )),
        ColumnType::Float => Some(TypedValue::Float(
            trimmed.parse::<f32>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        )),
        ColumnType::Integer => Some(TypedValue::Integer(raw.parse().unwrap_or(0))),
        ColumnType::Long => Some(TypedValue::Long(raw.parse().unwrap_or(0))),
        ColumnType::String => {
            (!trimmed.is_empty()).then(|| TypedValue::String(raw.to_string()))
        },
    }
}

fn is_all_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Translate a Java `SimpleDateFormat`-style pattern into strftime.
///
/// Quoted text ('T', 'at') becomes literal; unknown letters pass through.
pub fn java_pattern_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while let Some(&quoted) = chars.get(i) {
                if quoted == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                push_literal(&mut out, quoted);
                i += 1;
            }
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&next| next == c).count();
        let directive = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1 | 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('H', _) => "%H",
            ('h', _) => "%I",
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 4..=6) => "%6f",
            ('S', _) => "%9f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('u', _) => "%u",
            ('Z', _) => "%z",
            ('X', _) => "%:z",
            ('z', _) => "%Z",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                i += run;
                continue;
            },
        };
        out.push_str(directive);
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
