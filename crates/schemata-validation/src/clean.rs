//! Datatype checks and coercion.
//!
//! [`clean_value`] turns one non-empty JSON payload value into the storage
//! [`Value`] for a field's datatype, or explains why it cannot. Emptiness is
//! decided separately by [`is_empty`] so that requiredness can be checked
//! before any coercion happens.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use schemata_db::Value;
use schemata_schema::{Datatype, FieldDefinition};
use serde_json::Value as Json;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("valid regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9 +\-().]{7,20}$").expect("valid regex"));

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_WORDS: [&str; 4] = ["false", "0", "no", "off"];

/// Why a value was rejected: a stable code and a default message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid {
    /// Machine-readable code, e.g. `invalid_email`.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl Invalid {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Returns `true` for values that count as absent: `null`, empty or
/// whitespace-only strings, and empty arrays.
pub fn is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        Json::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Returns `true` for cleaned values that hold nothing, such as a
/// multi-select whose every choice was blank.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Json(Json::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Coerces a non-empty payload value to the storage value of `field`.
///
/// # Errors
///
/// Returns an [`Invalid`] describing the first problem found.
pub fn clean_value(field: &FieldDefinition, raw: &Json) -> Result<Value, Invalid> {
    match field.datatype {
        Datatype::Text | Datatype::LongText => text(raw).map(Value::String),
        Datatype::Email => {
            let s = text(raw)?;
            if EMAIL_RE.is_match(&s) {
                Ok(Value::String(s))
            } else {
                Err(Invalid::new("invalid_email", "Enter a valid email address."))
            }
        }
        Datatype::Url => {
            let s = text(raw)?;
            if URL_RE.is_match(&s) {
                Ok(Value::String(s))
            } else {
                Err(Invalid::new("invalid_url", "Enter a valid URL."))
            }
        }
        Datatype::Phone => {
            let s = text(raw)?;
            if PHONE_RE.is_match(&s) && s.chars().any(|c| c.is_ascii_digit()) {
                Ok(Value::String(s))
            } else {
                Err(Invalid::new("invalid_phone", "Enter a valid phone number."))
            }
        }
        Datatype::Integer => integer(raw)
            .map(Value::Int)
            .ok_or_else(|| Invalid::new("invalid_integer", "Enter a whole number.")),
        Datatype::Decimal => decimal(raw)
            .map(Value::Float)
            .ok_or_else(|| Invalid::new("invalid_decimal", "Enter a number.")),
        Datatype::Boolean => boolean(raw)
            .map(Value::Bool)
            .ok_or_else(|| Invalid::new("invalid_boolean", "Enter true or false.")),
        Datatype::Date => raw
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(Value::Date)
            .ok_or_else(|| Invalid::new("invalid_date", "Enter a valid date (YYYY-MM-DD).")),
        Datatype::Datetime => raw
            .as_str()
            .and_then(|s| datetime(s.trim()))
            .map(Value::DateTime)
            .ok_or_else(|| Invalid::new("invalid_datetime", "Enter a valid date/time.")),
        Datatype::Select => {
            let s = text(raw)?;
            if field.options().contains(&s.as_str()) {
                Ok(Value::String(s))
            } else {
                Err(not_a_choice(&s))
            }
        }
        Datatype::MultiSelect => multi_select(field, raw),
        Datatype::Reference => integer(raw)
            .filter(|id| *id > 0)
            .map(Value::Int)
            .ok_or_else(|| Invalid::new("invalid", "Enter a valid record id.")),
    }
}

/// Coerces a filter value for `field`: like [`clean_value`], but text kinds
/// skip format checks so any stored value can be matched exactly.
///
/// # Errors
///
/// Returns an [`Invalid`] for values that cannot be compared to the column.
pub fn clean_filter(field: &FieldDefinition, raw: &Json) -> Result<Value, Invalid> {
    match field.datatype {
        Datatype::Text
        | Datatype::LongText
        | Datatype::Email
        | Datatype::Url
        | Datatype::Phone
        | Datatype::Select => text(raw).map(Value::String),
        _ => clean_value(field, raw),
    }
}

fn text(raw: &Json) -> Result<String, Invalid> {
    match raw {
        Json::String(s) => Ok(s.trim().to_string()),
        Json::Number(n) => Ok(n.to_string()),
        _ => Err(Invalid::new("invalid", "Enter a text value.")),
    }
}

fn integer(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(raw: &Json) -> Option<f64> {
    let n = match raw {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn boolean(raw: &Json) -> Option<bool> {
    match raw {
        Json::Bool(b) => Some(*b),
        Json::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Json::String(s) => {
            let lower = s.trim().to_lowercase();
            if TRUE_WORDS.contains(&lower.as_str()) {
                Some(true)
            } else if FALSE_WORDS.contains(&lower.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM[:SS[.fff]]` taken as UTC.
fn datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn multi_select(field: &FieldDefinition, raw: &Json) -> Result<Value, Invalid> {
    let picked: Vec<String> = match raw {
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| Invalid::new("invalid_choice", "Every choice must be a string."))
            })
            .collect::<Result<_, _>>()?,
        Json::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => return Err(Invalid::new("invalid_choice", "Enter a list of choices.")),
    };

    let options = field.options();
    let mut selected: Vec<String> = Vec::with_capacity(picked.len());
    for choice in picked.into_iter().filter(|c| !c.is_empty()) {
        if !options.contains(&choice.as_str()) {
            return Err(not_a_choice(&choice));
        }
        if !selected.contains(&choice) {
            selected.push(choice);
        }
    }
    Ok(Value::Json(Json::Array(
        selected.into_iter().map(Json::String).collect(),
    )))
}

fn not_a_choice(choice: &str) -> Invalid {
    Invalid::new(
        "invalid_choice",
        format!("Select a valid choice. {choice} is not one of the available choices."),
    )
}
