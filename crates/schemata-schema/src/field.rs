//! Field definitions.
//!
//! A [`FieldDefinition`] is a reusable, named, typed unit of data. New fields
//! are described by a [`FieldDraft`] and existing ones changed through a
//! [`FieldPatch`]; both are checked here for everything that does not need
//! the registry (names, datatype, properties, rules).

use crate::datatype::Datatype;
use crate::identifier;
use crate::rules::{compile_all, CompiledRule, ValidationRule};
use chrono::{DateTime, Utc};
use schemata_core::{FieldError, SchemataError, SchemataResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// A registered field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Immutable unique key; also the column name in every object table.
    pub short_name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// The value kind.
    pub datatype: Datatype,
    /// Datatype-specific settings (`options`, `object`, ...).
    #[serde(default)]
    pub datatype_properties: Map<String, serde_json::Value>,
    /// Default requiredness; objects may override it.
    #[serde(default)]
    pub mandatory: bool,
    /// Ordered validation rules.
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    /// When the field was registered.
    pub created_at: DateTime<Utc>,
    /// When the field was last changed.
    pub updated_at: DateTime<Utc>,
}

impl FieldDefinition {
    /// Compiles the field's rules.
    ///
    /// # Errors
    ///
    /// Returns an internal error if stored rules no longer compile, which
    /// only happens if metadata was edited outside the registry.
    pub fn compiled_rules(&self) -> SchemataResult<Vec<CompiledRule>> {
        compile_all(&self.validation_rules, self.datatype).map_err(|problems| {
            SchemataError::InternalError(format!(
                "Stored rules of field '{}' are invalid: {problems:?}",
                self.short_name
            ))
        })
    }

    /// The configured options of a select field.
    pub fn options(&self) -> Vec<&str> {
        Datatype::options(&self.datatype_properties)
    }

    /// The referenced object type of a reference field.
    pub fn reference_target(&self) -> Option<&str> {
        if self.datatype == Datatype::Reference {
            Datatype::reference_target(&self.datatype_properties)
        } else {
            None
        }
    }

    /// Checks everything about a definition that needs no registry lookups.
    fn check(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if let Err(problem) = identifier::check_short_name(&self.short_name) {
            errors.push(FieldError::new("shortName", problem.code(), problem.message()));
        }
        if self.display_name.trim().is_empty() {
            errors.push(FieldError::new(
                "displayName",
                "required",
                "A display name is required.",
            ));
        }
        for error in self.datatype.validate_properties(&self.datatype_properties) {
            errors.push(error);
        }
        if let Err(problems) = compile_all(&self.validation_rules, self.datatype) {
            for (i, message) in problems {
                errors.push(FieldError::new(format!("validationRules[{i}]"), "invalid", message));
            }
        }
        ValidationError::check(INVALID_FIELD, errors)
    }
}

const INVALID_FIELD: &str = "Invalid field definition.";

fn required(errors: &mut Vec<FieldError>, field: &str, label: &str) {
    errors.push(FieldError::new(
        field,
        "required",
        format!("{label} is required."),
    ));
}

/// Input for registering a field.
///
/// Every member is optional so that missing members are reported as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDraft {
    /// The short name.
    pub short_name: Option<String>,
    /// The display name.
    pub display_name: Option<String>,
    /// The description.
    pub description: Option<String>,
    /// The datatype's wire name.
    pub datatype: Option<String>,
    /// Datatype properties.
    pub datatype_properties: Option<Map<String, serde_json::Value>>,
    /// Default requiredness.
    pub mandatory: Option<bool>,
    /// Validation rules.
    pub validation_rules: Option<Vec<ValidationRule>>,
}

impl FieldDraft {
    /// Starts a draft with the three required members.
    pub fn new(
        short_name: impl Into<String>,
        display_name: impl Into<String>,
        datatype: Datatype,
    ) -> Self {
        Self {
            short_name: Some(short_name.into()),
            display_name: Some(display_name.into()),
            datatype: Some(datatype.as_str().to_string()),
            ..Self::default()
        }
    }

    /// Parses a draft from JSON.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the document has the wrong shape.
    pub fn from_json(value: serde_json::Value) -> SchemataResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            ValidationError::new(format!("Malformed field definition: {e}")).into()
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default requiredness.
    #[must_use]
    pub const fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = Some(mandatory);
        self
    }

    /// Sets one datatype property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.datatype_properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the `options` of a select field.
    #[must_use]
    pub fn options<I, S>(self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options: Vec<serde_json::Value> = options
            .into_iter()
            .map(|o| serde_json::Value::String(o.into()))
            .collect();
        self.property("options", serde_json::Value::Array(options))
    }

    /// Sets the referenced object of a reference field.
    #[must_use]
    pub fn references(self, object: impl Into<String>) -> Self {
        self.property("object", serde_json::Value::String(object.into()))
    }

    /// Appends a validation rule.
    #[must_use]
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.get_or_insert_with(Vec::new).push(rule);
        self
    }

    /// Turns the draft into a definition stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns every problem found, in member order.
    pub fn into_definition(self, now: DateTime<Utc>) -> Result<FieldDefinition, ValidationError> {
        let mut errors = Vec::new();
        if self.short_name.is_none() {
            required(&mut errors, "shortName", "A short name");
        }
        if self.display_name.is_none() {
            required(&mut errors, "displayName", "A display name");
        }
        let datatype = match self.datatype.as_deref().map(str::parse::<Datatype>) {
            Some(Ok(d)) => Some(d),
            Some(Err(message)) => {
                errors.push(FieldError::new("datatype", "invalid", message));
                None
            }
            None => {
                required(&mut errors, "datatype", "A datatype");
                None
            }
        };
        let (Some(short_name), Some(display_name), Some(datatype)) =
            (self.short_name, self.display_name, datatype)
        else {
            return Err(ValidationError {
                message: INVALID_FIELD.to_string(),
                field_errors: errors,
            });
        };

        let definition = FieldDefinition {
            short_name,
            display_name,
            description: self.description.unwrap_or_default(),
            datatype,
            datatype_properties: self.datatype_properties.unwrap_or_default(),
            mandatory: self.mandatory.unwrap_or(false),
            validation_rules: self.validation_rules.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        definition.check()?;
        Ok(definition)
    }
}

/// A partial update of a field. The short name cannot change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldPatch {
    /// Must be absent or equal to the current short name.
    pub short_name: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New datatype.
    pub datatype: Option<String>,
    /// Replacement datatype properties.
    pub datatype_properties: Option<Map<String, serde_json::Value>>,
    /// New default requiredness.
    pub mandatory: Option<bool>,
    /// Replacement rule list.
    pub validation_rules: Option<Vec<ValidationRule>>,
}

impl FieldPatch {
    /// Parses a patch from JSON.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the document has the wrong shape.
    pub fn from_json(value: serde_json::Value) -> SchemataResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            ValidationError::new(format!("Malformed field update: {e}")).into()
        })
    }

    /// Returns the datatype this patch switches to, if it names one.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown datatype.
    pub fn new_datatype(&self) -> Result<Option<Datatype>, ValidationError> {
        self.datatype
            .as_deref()
            .map(str::parse::<Datatype>)
            .transpose()
            .map_err(|message| {
                ValidationError::with_field_errors(vec![FieldError::new(
                    "datatype", "invalid", message,
                )])
            })
    }

    /// Applies the patch to `current`, stamping `updated_at` with `now`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the patch renames the field or the
    /// merged definition is invalid.
    pub fn apply(
        self,
        current: &FieldDefinition,
        now: DateTime<Utc>,
    ) -> Result<FieldDefinition, ValidationError> {
        if let Some(ref name) = self.short_name {
            if name != &current.short_name {
                return Err(ValidationError::with_field_errors(vec![FieldError::new(
                    "shortName",
                    "immutable",
                    "The short name of a field cannot be changed.",
                )]));
            }
        }
        let datatype = self.new_datatype()?.unwrap_or(current.datatype);
        let merged = FieldDefinition {
            short_name: current.short_name.clone(),
            display_name: self.display_name.unwrap_or_else(|| current.display_name.clone()),
            description: self.description.unwrap_or_else(|| current.description.clone()),
            datatype,
            datatype_properties: self
                .datatype_properties
                .unwrap_or_else(|| current.datatype_properties.clone()),
            mandatory: self.mandatory.unwrap_or(current.mandatory),
            validation_rules: self
                .validation_rules
                .unwrap_or_else(|| current.validation_rules.clone()),
            created_at: current.created_at,
            updated_at: now,
        };
        merged.check()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_draft_into_definition() {
        let def = FieldDraft::new("email", "Email", Datatype::Email)
            .mandatory(true)
            .rule(ValidationRule::max_length(120))
            .into_definition(now())
            .unwrap();
        assert_eq!(def.short_name, "email");
        assert!(def.mandatory);
        assert_eq!(def.created_at, def.updated_at);
        assert_eq!(def.validation_rules.len(), 1);
    }

    #[test]
    fn test_draft_missing_members_reported_together() {
        let err = FieldDraft::default().into_definition(now()).unwrap_err();
        let fields: Vec<&str> = err.field_errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["shortName", "displayName", "datatype"]);
    }

    #[test]
    fn test_draft_unknown_datatype() {
        let draft = FieldDraft::from_json(json!({
            "shortName": "price",
            "displayName": "Price",
            "datatype": "money"
        }))
        .unwrap();
        let err = draft.into_definition(now()).unwrap_err();
        assert!(err.has_field("datatype"));
    }

    #[test]
    fn test_draft_reserved_and_malformed_names() {
        let err = FieldDraft::new("id", "Id", Datatype::Integer)
            .into_definition(now())
            .unwrap_err();
        assert_eq!(err.errors_for("shortName").next().unwrap().code, "reserved");

        let err = FieldDraft::new("Bad Name", "X", Datatype::Text)
            .into_definition(now())
            .unwrap_err();
        assert_eq!(err.errors_for("shortName").next().unwrap().code, "invalid");
    }

    #[test]
    fn test_draft_invalid_rules_are_indexed() {
        let err = FieldDraft::new("age", "Age", Datatype::Integer)
            .rule(ValidationRule::min_value(0.0))
            .rule(ValidationRule::pattern("[0-9]+"))
            .into_definition(now())
            .unwrap_err();
        assert!(err.has_field("validationRules[1]"));
        assert!(!err.has_field("validationRules[0]"));
    }

    #[test]
    fn test_draft_select_without_options() {
        let err = FieldDraft::new("color", "Color", Datatype::Select)
            .into_definition(now())
            .unwrap_err();
        assert!(err.has_field("datatypeProperties.options"));

        let def = FieldDraft::new("color", "Color", Datatype::Select)
            .options(["red", "green"])
            .into_definition(now())
            .unwrap();
        assert_eq!(def.options(), vec!["red", "green"]);
    }

    #[test]
    fn test_malformed_json_is_validation_error() {
        let err = FieldDraft::from_json(json!({"mandatory": "yes"})).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_patch_merges_and_bumps_updated_at() {
        let def = FieldDraft::new("name", "Name", Datatype::Text)
            .into_definition(now())
            .unwrap();
        let later = now() + chrono::Duration::seconds(5);
        let patch = FieldPatch {
            display_name: Some("Full name".into()),
            mandatory: Some(true),
            ..FieldPatch::default()
        };
        let updated = patch.apply(&def, later).unwrap();
        assert_eq!(updated.display_name, "Full name");
        assert!(updated.mandatory);
        assert_eq!(updated.created_at, def.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_patch_cannot_rename() {
        let def = FieldDraft::new("name", "Name", Datatype::Text)
            .into_definition(now())
            .unwrap();
        let patch = FieldPatch {
            short_name: Some("title".into()),
            ..FieldPatch::default()
        };
        let err = patch.apply(&def, now()).unwrap_err();
        assert_eq!(err.field_errors[0].code, "immutable");

        let same = FieldPatch {
            short_name: Some("name".into()),
            ..FieldPatch::default()
        };
        assert!(same.apply(&def, now()).is_ok());
    }

    #[test]
    fn test_patch_revalidates_merged_definition() {
        let def = FieldDraft::new("name", "Name", Datatype::Text)
            .rule(ValidationRule::max_length(5))
            .into_definition(now())
            .unwrap();
        let patch = FieldPatch {
            datatype: Some("integer".into()),
            ..FieldPatch::default()
        };
        let err = patch.apply(&def, now()).unwrap_err();
        assert!(err.has_field("validationRules[0]"));
    }

    #[test]
    fn test_reference_target() {
        let def = FieldDraft::new("owner", "Owner", Datatype::Reference)
            .references("customer")
            .into_definition(now())
            .unwrap();
        assert_eq!(def.reference_target(), Some("customer"));
    }

    #[test]
    fn test_definition_serializes_camel_case() {
        let def = FieldDraft::new("name", "Name", Datatype::LongText)
            .into_definition(now())
            .unwrap();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["shortName"], "name");
        assert_eq!(json["datatype"], "long_text");
        assert!(json.get("validationRules").is_some());
    }
}
