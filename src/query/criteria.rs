//! Search criteria and their textual encoding.

use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{Result, ValidateError};
use crate::options::DEFAULT_DATE_FORMAT;
use crate::utils::quote;

/// Input formats tried, in order, when a date criterion is given as text.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d %b %Y", "%d.%m.%Y"];
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// The value of a search criterion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// A calendar date, rendered with the configured date format.
    Date(NaiveDate),
    /// Anything else, rendered as-is.
    Text(String),
}

impl Value {
    /// Renders the value as a search token.
    ///
    /// A `date_format` chrono cannot render with falls back to the RFC 3501 date form.
    pub fn encode(&self, date_format: &str) -> String {
        match *self {
            Value::Text(ref text) => text.clone(),
            Value::Date(date) => {
                let mut out = String::new();
                if write!(out, "{}", date.format(date_format)).is_ok() {
                    return out;
                }
                log::warn!(
                    "date format {:?} cannot render a date, using {:?}",
                    date_format,
                    DEFAULT_DATE_FORMAT
                );
                date.format(DEFAULT_DATE_FORMAT).to_string()
            }
        }
    }
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Value::Date(date)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

macro_rules! value_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Text(n.to_string())
                }
            }
        )*
    };
}

value_from_number!(u32, u64, usize, i32, i64);

/// One search key: an operator token, optionally followed by an already encoded value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Statement {
    operator: String,
    value: Option<String>,
}

impl Statement {
    pub(crate) fn new(operator: String, value: Option<String>) -> Statement {
        Statement { operator, value }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// The encoded value, `None` for flag-only criteria.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref value) => write!(f, "{} {}", self.operator, quote(value)),
            None => f.write_str(&self.operator),
        }
    }
}

/// Something that can be validated into a calendar date for a date criterion.
pub trait IntoDate {
    /// Converts `self`, failing with [`ValidateError::InvalidDate`] when it is not a date.
    fn into_date(self) -> Result<NaiveDate>;
}

impl IntoDate for NaiveDate {
    fn into_date(self) -> Result<NaiveDate> {
        Ok(self)
    }
}

impl IntoDate for NaiveDateTime {
    fn into_date(self) -> Result<NaiveDate> {
        Ok(self.date())
    }
}

impl<Tz: TimeZone> IntoDate for DateTime<Tz> {
    fn into_date(self) -> Result<NaiveDate> {
        Ok(self.date_naive())
    }
}

impl IntoDate for &str {
    fn into_date(self) -> Result<NaiveDate> {
        parse_date(self)
    }
}

impl IntoDate for String {
    fn into_date(self) -> Result<NaiveDate> {
        parse_date(&self)
    }
}

impl IntoDate for &String {
    fn into_date(self) -> Result<NaiveDate> {
        parse_date(self)
    }
}

/// Parses a textual date, accepting RFC 3339, RFC 2822 and a handful of common layouts.
///
/// The error reports the first format tried so its cause stays meaningful for ISO dates.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.date_naive());
    }
    if let Some(dt) = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
    {
        return Ok(dt.date());
    }

    let mut parsed = NaiveDate::parse_from_str(trimmed, DATE_FORMATS[0]);
    for fmt in &DATE_FORMATS[1..] {
        if parsed.is_ok() {
            break;
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            parsed = Ok(date);
        }
    }

    parsed.map_err(|cause| {
        ValidateError::InvalidDate {
            input: input.to_string(),
            cause,
        }
        .into()
    })
}
