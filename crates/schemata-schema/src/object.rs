//! Object definitions.
//!
//! An [`ObjectDefinition`] is a named record type: an ordered list of field
//! references plus display, search and sort metadata. Structural checks
//! (names, duplicates, display names drawn from `fields`) happen here; the
//! registry checks that referenced fields actually exist.

use crate::identifier;
use chrono::{DateTime, Utc};
use schemata_core::{FieldError, SchemataResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub(crate) const INVALID_OBJECT: &str = "Invalid object definition.";

/// One field used by an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFieldRef {
    /// The referenced field.
    pub field_short_name: String,
    /// Overrides the field's default requiredness for this object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory_override: Option<bool>,
    /// Position; fields are stored sorted by it.
    #[serde(default)]
    pub order: i64,
}

impl ObjectFieldRef {
    /// References `field` at position `order`.
    pub fn new(field: impl Into<String>, order: i64) -> Self {
        Self {
            field_short_name: field.into(),
            mandatory_override: None,
            order,
        }
    }

    /// Overrides requiredness.
    #[must_use]
    pub const fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory_override = Some(mandatory);
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Returns `true` for [`SortOrder::Desc`].
    pub const fn is_descending(self) -> bool {
        matches!(self, Self::Desc)
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("Unknown sort order '{other}'; use 'asc' or 'desc'.")),
        }
    }
}

/// Display, search and sort metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayProperties {
    /// Sort field used when a list request names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_sort_field: Option<String>,
    /// Sort order used when a list request names none.
    pub default_sort_order: SortOrder,
    /// Fields matched by free-text search.
    pub searchable_fields: Vec<String>,
    /// Fields shown as list columns.
    pub table_columns: Vec<String>,
}

impl DisplayProperties {
    /// Every field name mentioned, with the member it came from.
    fn mentioned(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        let sort = self
            .default_sort_field
            .iter()
            .map(|f| ("displayProperties.defaultSortField".to_string(), f.as_str()));
        let search = self
            .searchable_fields
            .iter()
            .enumerate()
            .map(|(i, f)| (format!("displayProperties.searchableFields[{i}]"), f.as_str()));
        let columns = self
            .table_columns
            .iter()
            .enumerate()
            .map(|(i, f)| (format!("displayProperties.tableColumns[{i}]"), f.as_str()));
        sort.chain(search).chain(columns)
    }
}

/// A registered object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDefinition {
    /// Immutable unique key; also the table name.
    pub short_name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Field references, sorted by `order`.
    #[serde(default)]
    pub fields: Vec<ObjectFieldRef>,
    /// Display, search and sort metadata.
    #[serde(default)]
    pub display_properties: DisplayProperties,
    /// When the object was registered.
    pub created_at: DateTime<Utc>,
    /// When the object was last changed.
    pub updated_at: DateTime<Utc>,
}

impl ObjectDefinition {
    /// Names of the referenced fields, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.field_short_name.as_str())
    }

    /// Returns `true` if the object references `field`.
    pub fn uses_field(&self, field: &str) -> bool {
        self.field_names().any(|f| f == field)
    }

    /// Sorts fields by `order`, keeping declaration order for ties.
    fn normalize(&mut self) {
        self.fields.sort_by_key(|f| f.order);
    }

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

        let mut seen = HashSet::new();
        for (i, field) in self.fields.iter().enumerate() {
            if !seen.insert(field.field_short_name.as_str()) {
                errors.push(FieldError::new(
                    format!("fields[{i}].fieldShortName"),
                    "duplicate",
                    format!("Field '{}' is listed more than once.", field.field_short_name),
                ));
            }
        }

        for (member, name) in self.display_properties.mentioned() {
            if !seen.contains(name) {
                errors.push(FieldError::new(
                    member,
                    "invalid",
                    format!("'{name}' is not one of this object's fields."),
                ));
            }
        }
        ValidationError::check(INVALID_OBJECT, errors)
    }
}

/// Input for registering an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectDraft {
    /// The short name.
    pub short_name: Option<String>,
    /// The display name.
    pub display_name: Option<String>,
    /// The description.
    pub description: Option<String>,
    /// Field references.
    pub fields: Option<Vec<ObjectFieldRef>>,
    /// Display metadata.
    pub display_properties: Option<DisplayProperties>,
}

impl ObjectDraft {
    /// Starts a draft with the two required members.
    pub fn new(short_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            short_name: Some(short_name.into()),
            display_name: Some(display_name.into()),
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
            ValidationError::new(format!("Malformed object definition: {e}")).into()
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a field reference.
    #[must_use]
    pub fn field(mut self, field: ObjectFieldRef) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(field);
        self
    }

    /// Sets display metadata.
    #[must_use]
    pub fn display(mut self, display: DisplayProperties) -> Self {
        self.display_properties = Some(display);
        self
    }

    /// Turns the draft into a definition stamped with `now`, fields sorted
    /// by `order`.
    ///
    /// # Errors
    ///
    /// Returns every structural problem found.
    pub fn into_definition(self, now: DateTime<Utc>) -> Result<ObjectDefinition, ValidationError> {
        let mut errors = Vec::new();
        if self.short_name.is_none() {
            errors.push(FieldError::new("shortName", "required", "A short name is required."));
        }
        if self.display_name.is_none() {
            errors.push(FieldError::new(
                "displayName",
                "required",
                "A display name is required.",
            ));
        }
        let (Some(short_name), Some(display_name)) = (self.short_name, self.display_name) else {
            return Err(ValidationError {
                message: INVALID_OBJECT.to_string(),
                field_errors: errors,
            });
        };
        let mut definition = ObjectDefinition {
            short_name,
            display_name,
            description: self.description.unwrap_or_default(),
            fields: self.fields.unwrap_or_default(),
            display_properties: self.display_properties.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        definition.check()?;
        definition.normalize();
        Ok(definition)
    }
}

/// A partial update of an object. The short name cannot change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectPatch {
    /// Must be absent or equal to the current short name.
    pub short_name: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement field list.
    pub fields: Option<Vec<ObjectFieldRef>>,
    /// Replacement display metadata.
    pub display_properties: Option<DisplayProperties>,
}

impl ObjectPatch {
    /// Parses a patch from JSON.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the document has the wrong shape.
    pub fn from_json(value: serde_json::Value) -> SchemataResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| ValidationError::new(format!("Malformed object update: {e}")).into())
    }

    /// Applies the patch to `current`, stamping `updated_at` with `now`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the patch renames the object or the
    /// merged definition is invalid.
    pub fn apply(
        self,
        current: &ObjectDefinition,
        now: DateTime<Utc>,
    ) -> Result<ObjectDefinition, ValidationError> {
        if let Some(ref name) = self.short_name {
            if name != &current.short_name {
                return Err(ValidationError::field(
                    "shortName",
                    "immutable",
                    "The short name of an object cannot be changed.",
                ));
            }
        }
        let mut merged = ObjectDefinition {
            short_name: current.short_name.clone(),
            display_name: self.display_name.unwrap_or_else(|| current.display_name.clone()),
            description: self.description.unwrap_or_else(|| current.description.clone()),
            fields: self.fields.unwrap_or_else(|| current.fields.clone()),
            display_properties: self
                .display_properties
                .unwrap_or_else(|| current.display_properties.clone()),
            created_at: current.created_at,
            updated_at: now,
        };
        merged.check()?;
        merged.normalize();
        Ok(merged)
    }
}
