//! Field datatypes.
//!
//! [`Datatype`] is the closed set of value kinds a field can hold. Each one
//! knows its storage column type, which `datatypeProperties` it requires, and
//! how to turn a stored [`Value`] back into JSON.

use crate::identifier;
use schemata_core::FieldError;
use schemata_db::Value;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::fmt;
use std::str::FromStr;

/// The datatype of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datatype {
    /// Single-line text.
    Text,
    /// Multi-line text.
    LongText,
    /// An email address.
    Email,
    /// An http(s) URL.
    Url,
    /// A phone number.
    Phone,
    /// A 64-bit integer.
    Integer,
    /// A floating-point number.
    Decimal,
    /// A boolean.
    Boolean,
    /// A calendar date (`YYYY-MM-DD`).
    Date,
    /// A UTC timestamp.
    Datetime,
    /// One value out of `options`.
    Select,
    /// Any subset of `options`.
    MultiSelect,
    /// The id of a record of another object type.
    Reference,
}

impl Datatype {
    /// Every datatype, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Text,
        Self::LongText,
        Self::Email,
        Self::Url,
        Self::Phone,
        Self::Integer,
        Self::Decimal,
        Self::Boolean,
        Self::Date,
        Self::Datetime,
        Self::Select,
        Self::MultiSelect,
        Self::Reference,
    ];

    /// Returns the wire name, e.g. `"multi_select"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::LongText => "long_text",
            Self::Email => "email",
            Self::Url => "url",
            Self::Phone => "phone",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Reference => "reference",
        }
    }

    /// Returns the SQLite column type used to store this datatype.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean | Self::Reference => "INTEGER",
            Self::Decimal => "REAL",
            Self::Text
            | Self::LongText
            | Self::Email
            | Self::Url
            | Self::Phone
            | Self::Date
            | Self::Datetime
            | Self::Select
            | Self::MultiSelect => "TEXT",
        }
    }

    /// Datatypes whose stored value is a single string.
    pub const fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Text | Self::LongText | Self::Email | Self::Url | Self::Phone | Self::Select
        )
    }

    /// Datatypes compared by numeric value.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    /// Datatypes that have a length (characters, or selected options).
    pub const fn has_length(self) -> bool {
        self.is_textual() || matches!(self, Self::MultiSelect)
    }

    /// Checks `datatypeProperties` for this datatype.
    ///
    /// `select` and `multi_select` require `options`, a non-empty array of
    /// distinct non-empty strings. `reference` requires `object`, the short
    /// name of the referenced object type. Other keys are kept as-is.
    pub fn validate_properties(self, props: &Map<String, serde_json::Value>) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match self {
            Self::Select | Self::MultiSelect => match props.get("options") {
                Some(serde_json::Value::Array(items)) if !items.is_empty() => {
                    let mut seen = Vec::with_capacity(items.len());
                    for item in items {
                        match item.as_str() {
                            Some(s) if !s.trim().is_empty() && !seen.contains(&s) => seen.push(s),
                            Some(s) if !s.trim().is_empty() => {
                                errors.push(FieldError::new(
                                    "datatypeProperties.options",
                                    "duplicate",
                                    format!("Option '{s}' is listed more than once."),
                                ));
                            }
                            _ => {
                                errors.push(FieldError::new(
                                    "datatypeProperties.options",
                                    "invalid",
                                    "Options must be non-empty strings.",
                                ));
                            }
                        }
                    }
                }
                _ => errors.push(FieldError::new(
                    "datatypeProperties.options",
                    "required",
                    format!("A {} field requires a non-empty 'options' list.", self.as_str()),
                )),
            },
            Self::Reference => match props.get("object").and_then(serde_json::Value::as_str) {
                Some(target) if identifier::is_well_formed(target) => {}
                Some(_) => errors.push(FieldError::new(
                    "datatypeProperties.object",
                    "invalid",
                    "The referenced object must be a valid short name.",
                )),
                None => errors.push(FieldError::new(
                    "datatypeProperties.object",
                    "required",
                    "A reference field requires the short name of the referenced 'object'.",
                )),
            },
            _ => {}
        }
        errors
    }

    /// Returns the configured options of a `select` / `multi_select` field.
    pub fn options(props: &Map<String, serde_json::Value>) -> Vec<&str> {
        props
            .get("options")
            .and_then(serde_json::Value::as_array)
            .map(|items| items.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the referenced object of a `reference` field.
    pub fn reference_target(props: &Map<String, serde_json::Value>) -> Option<&str> {
        props.get("object").and_then(serde_json::Value::as_str)
    }

    /// Decodes a stored value into its JSON representation.
    ///
    /// Booleans come back as JSON booleans, multi-select values as arrays and
    /// numbers as numbers; NULL is `null`.
    pub fn decode(self, value: &Value) -> serde_json::Value {
        use serde_json::Value as Json;
        match (self, value) {
            (_, Value::Null) => Json::Null,
            (Self::Boolean, Value::Int(i)) => Json::Bool(*i != 0),
            (_, Value::Bool(b)) => Json::Bool(*b),
            (Self::Decimal, v) => v
                .as_float()
                .and_then(serde_json::Number::from_f64)
                .map_or(Json::Null, Json::Number),
            (Self::MultiSelect, Value::String(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| Json::Array(vec![Json::String(s.clone())]))
            }
            (_, Value::Json(j)) => j.clone(),
            (_, Value::Int(i)) => Json::from(*i),
            (_, Value::Float(f)) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            (_, Value::String(s)) => Json::String(s.clone()),
            (_, Value::Date(d)) => Json::String(d.to_string()),
            (_, Value::DateTime(dt)) => Json::String(dt.to_rfc3339()),
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datatype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("Unknown datatype '{s}'."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_round_trip() {
        for d in Datatype::ALL {
            assert_eq!(d.as_str().parse::<Datatype>().unwrap(), d);
            assert_eq!(serde_json::to_value(d).unwrap(), json!(d.as_str()));
        }
        assert!("money".parse::<Datatype>().is_err());
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(Datatype::Integer.sql_type(), "INTEGER");
        assert_eq!(Datatype::Boolean.sql_type(), "INTEGER");
        assert_eq!(Datatype::Reference.sql_type(), "INTEGER");
        assert_eq!(Datatype::Decimal.sql_type(), "REAL");
        assert_eq!(Datatype::MultiSelect.sql_type(), "TEXT");
        assert_eq!(Datatype::Datetime.sql_type(), "TEXT");
    }

    #[test]
    fn test_select_requires_options() {
        let errors = Datatype::Select.validate_properties(&Map::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "required");

        let errors = Datatype::Select.validate_properties(&props(json!({"options": []})));
        assert_eq!(errors[0].code, "required");

        let errors = Datatype::MultiSelect.validate_properties(&props(json!({"options": ["a", 1]})));
        assert_eq!(errors[0].code, "invalid");

        let errors = Datatype::Select.validate_properties(&props(json!({"options": ["a", "a"]})));
        assert_eq!(errors[0].code, "duplicate");

        assert!(Datatype::Select
            .validate_properties(&props(json!({"options": ["red", "green"]})))
            .is_empty());
    }

    #[test]
    fn test_reference_requires_object() {
        let errors = Datatype::Reference.validate_properties(&Map::new());
        assert_eq!(errors[0].field, "datatypeProperties.object");
        let errors = Datatype::Reference.validate_properties(&props(json!({"object": "Bad Name"})));
        assert_eq!(errors[0].code, "invalid");
        assert!(Datatype::Reference
            .validate_properties(&props(json!({"object": "customer"})))
            .is_empty());
    }

    #[test]
    fn test_other_types_accept_any_properties() {
        assert!(Datatype::Text
            .validate_properties(&props(json!({"placeholder": "x"})))
            .is_empty());
    }

    #[test]
    fn test_decode() {
        assert_eq!(Datatype::Boolean.decode(&Value::Int(1)), json!(true));
        assert_eq!(Datatype::Boolean.decode(&Value::Int(0)), json!(false));
        assert_eq!(Datatype::Integer.decode(&Value::Int(7)), json!(7));
        assert_eq!(Datatype::Decimal.decode(&Value::Int(7)), json!(7.0));
        assert_eq!(Datatype::Decimal.decode(&Value::Float(2.5)), json!(2.5));
        assert_eq!(
            Datatype::MultiSelect.decode(&Value::from("[\"a\",\"b\"]")),
            json!(["a", "b"])
        );
        assert_eq!(Datatype::Text.decode(&Value::Null), json!(null));
        assert_eq!(Datatype::Date.decode(&Value::from("2024-01-02")), json!("2024-01-02"));
    }
}
