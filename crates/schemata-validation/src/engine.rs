//! Payload validation against a resolved object schema.

use crate::clean::{clean_value, is_empty, is_empty_value};
use crate::validators::run_rules;
use schemata_core::{FieldError, ValidationError};
use schemata_db::Value;
use schemata_schema::{ObjectSchema, ResolvedField};
use serde_json::{Map, Value as Json};

/// Whether a payload creates a record or partially updates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every mandatory field must be present and non-empty.
    Create,
    /// Only fields present in the payload are checked.
    Update,
}

/// Storage values keyed by field short name, in object field order.
pub type CleanedValues = Vec<(String, Value)>;

const INVALID_PAYLOAD: &str = "Invalid payload.";

/// Validates `payload` for `schema`.
///
/// Fields are visited in object field order. For each field the required
/// check runs first, then the datatype check, then the field's rules in
/// declared order; the first failure stops that field only. Keys that are
/// not fields of the object are ignored. A present but empty optional field
/// is cleaned to `NULL`.
///
/// # Errors
///
/// Returns a [`ValidationError`] whose field errors follow object field
/// order. A payload that is not a JSON object fails without field detail.
pub fn validate_payload(
    schema: &ObjectSchema,
    payload: &Json,
    mode: ValidationMode,
) -> Result<CleanedValues, ValidationError> {
    let Json::Object(map) = payload else {
        return Err(ValidationError::new("Payload must be a JSON object."));
    };

    let mut cleaned = Vec::with_capacity(map.len().min(schema.fields.len()));
    let mut errors = Vec::new();
    for field in &schema.fields {
        match validate_field(field, map, mode) {
            Ok(Some(value)) => cleaned.push((field.name().to_string(), value)),
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
    }

    if !errors.is_empty() {
        tracing::debug!(
            object = schema.name(),
            errors = errors.len(),
            "payload rejected"
        );
    }
    ValidationError::check(INVALID_PAYLOAD, errors)?;
    Ok(cleaned)
}

fn validate_field(
    field: &ResolvedField,
    payload: &Map<String, Json>,
    mode: ValidationMode,
) -> Result<Option<Value>, FieldError> {
    let name = field.name();
    let raw = match payload.get(name) {
        None if mode == ValidationMode::Create && field.mandatory => {
            return Err(required(name));
        }
        None => return Ok(None),
        Some(raw) if is_empty(raw) => {
            if field.mandatory {
                return Err(required(name));
            }
            return Ok(Some(Value::Null));
        }
        Some(raw) => raw,
    };

    let value = clean_value(&field.definition, raw)
        .map_err(|invalid| FieldError::new(name, invalid.code, invalid.message))?;
    if is_empty_value(&value) {
        if field.mandatory {
            return Err(required(name));
        }
        return Ok(Some(Value::Null));
    }
    if let Some(failure) = run_rules(&field.rules, &value) {
        return Err(FieldError::new(name, failure.code, failure.message));
    }
    Ok(Some(value))
}

fn required(name: &str) -> FieldError {
    FieldError::new(name, "required", "This field is required.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use schemata_schema::{
        Datatype, FieldDefinition, FieldDraft, ObjectDraft, ObjectFieldRef, ValidationRule,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn schema() -> ObjectSchema {
        let now = Utc::now();
        let defs: HashMap<String, FieldDefinition> = [
            FieldDraft::new("email", "Email", Datatype::Email).mandatory(true),
            FieldDraft::new("name", "Name", Datatype::Text)
                .rule(ValidationRule::max_length(5).with_message("Name too long")),
            FieldDraft::new("age", "Age", Datatype::Integer).rule(ValidationRule::min_value(0.0)),
        ]
        .into_iter()
        .map(|d| d.into_definition(now).unwrap())
        .map(|f| (f.short_name.clone(), f))
        .collect();
        let object = ObjectDraft::new("customer", "Customer")
            .field(ObjectFieldRef::new("email", 0))
            .field(ObjectFieldRef::new("name", 1))
            .field(ObjectFieldRef::new("age", 2))
            .into_definition(now)
            .unwrap();
        ObjectSchema::resolve(object, |n| defs.get(n)).unwrap()
    }

    #[test]
    fn test_create_requires_mandatory() {
        let err = validate_payload(&schema(), &json!({}), ValidationMode::Create).unwrap_err();
        assert_eq!(err.field_errors.len(), 1);
        assert_eq!(err.field_errors[0].field, "email");
        assert_eq!(err.field_errors[0].code, "required");
    }

    #[test]
    fn test_whitespace_counts_as_missing() {
        let err = validate_payload(&schema(), &json!({"email": "  "}), ValidationMode::Create)
            .unwrap_err();
        assert_eq!(err.field_errors[0].code, "required");
    }

    #[test]
    fn test_create_normalizes_in_field_order() {
        let cleaned = validate_payload(
            &schema(),
            &json!({"age": "42", "email": " a@b.com ", "extra": true}),
            ValidationMode::Create,
        )
        .unwrap();
        assert_eq!(
            cleaned,
            vec![
                ("email".to_string(), Value::String("a@b.com".into())),
                ("age".to_string(), Value::Int(42)),
            ]
        );
    }

    #[test]
    fn test_errors_follow_field_order() {
        let err = validate_payload(
            &schema(),
            &json!({"age": -1, "name": "Bartholomew", "email": "bad"}),
            ValidationMode::Create,
        )
        .unwrap_err();
        let fields: Vec<(&str, &str)> = err
            .field_errors
            .iter()
            .map(|e| (e.field.as_str(), e.code.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![("email", "invalid_email"), ("name", "max_length"), ("age", "min_value")]
        );
        assert_eq!(err.field_errors[1].message, "Name too long");
    }

    #[test]
    fn test_update_checks_only_present_fields() {
        let cleaned =
            validate_payload(&schema(), &json!({"name": "Bo"}), ValidationMode::Update).unwrap();
        assert_eq!(cleaned, vec![("name".to_string(), Value::String("Bo".into()))]);

        let err = validate_payload(&schema(), &json!({"email": null}), ValidationMode::Update)
            .unwrap_err();
        assert_eq!(err.field_errors[0].code, "required");
    }

    #[test]
    fn test_optional_empty_clears() {
        let cleaned =
            validate_payload(&schema(), &json!({"name": ""}), ValidationMode::Update).unwrap();
        assert_eq!(cleaned, vec![("name".to_string(), Value::Null)]);
    }

    fn tagged(mandatory: bool) -> ObjectSchema {
        let now = Utc::now();
        let tags = FieldDraft::new("tags", "Tags", Datatype::MultiSelect)
            .options(["a", "b"])
            .mandatory(mandatory)
            .into_definition(now)
            .unwrap();
        let object = ObjectDraft::new("post", "Post")
            .field(ObjectFieldRef::new("tags", 0))
            .into_definition(now)
            .unwrap();
        ObjectSchema::resolve(object, |n| (n == "tags").then_some(&tags)).unwrap()
    }

    #[test]
    fn test_blank_choices_count_as_missing() {
        for raw in [json!([""]), json!([" ", ""]), json!(","), json!(" , ")] {
            let err = validate_payload(&tagged(true), &json!({"tags": raw}), ValidationMode::Create)
                .unwrap_err();
            assert_eq!(err.field_errors[0].field, "tags", "{raw}");
            assert_eq!(err.field_errors[0].code, "required", "{raw}");
        }
    }

    #[test]
    fn test_blank_choices_clear_optional_field() {
        for raw in [json!([""]), json!(",")] {
            let cleaned =
                validate_payload(&tagged(false), &json!({"tags": raw}), ValidationMode::Create)
                    .unwrap();
            assert_eq!(cleaned, vec![("tags".to_string(), Value::Null)], "{raw}");
        }
        let cleaned =
            validate_payload(&tagged(false), &json!({"tags": ["b", ""]}), ValidationMode::Create)
                .unwrap();
        assert_eq!(cleaned, vec![("tags".to_string(), Value::Json(json!(["b"])))]);
    }

    #[test]
    fn test_rules_skip_after_datatype_failure() {
        let err = validate_payload(
            &schema(),
            &json!({"email": "a@b.com", "age": "old"}),
            ValidationMode::Create,
        )
        .unwrap_err();
        assert_eq!(err.field_errors.len(), 1);
        assert_eq!(err.field_errors[0].code, "invalid_integer");
    }

    #[test]
    fn test_non_object_payload() {
        let err = validate_payload(&schema(), &json!([1, 2]), ValidationMode::Create).unwrap_err();
        assert!(err.field_errors.is_empty());
        assert!(!err.message.is_empty());
    }
}
