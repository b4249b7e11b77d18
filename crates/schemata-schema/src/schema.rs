//! Resolved object schemas.
//!
//! An [`ObjectSchema`] joins an object definition with the definitions of
//! the fields it references, effective requiredness and compiled rules. It is
//! what the validation and instance engines work from, and what the
//! [`SchemaCache`](crate::cache::SchemaCache) stores.

use crate::datatype::Datatype;
use crate::field::FieldDefinition;
use crate::identifier::SYSTEM_COLUMNS;
use crate::object::{ObjectDefinition, SortOrder};
use crate::rules::CompiledRule;
use schemata_core::{SchemataError, SchemataResult};

/// A field as used by one object.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    /// The field's definition.
    pub definition: FieldDefinition,
    /// Effective requiredness: the object's override, else the field default.
    pub mandatory: bool,
    /// The field's rules, compiled, in declared order.
    pub rules: Vec<CompiledRule>,
}

impl ResolvedField {
    /// The field's short name (its column name).
    pub fn name(&self) -> &str {
        &self.definition.short_name
    }

    /// The field's datatype.
    pub const fn datatype(&self) -> Datatype {
        self.definition.datatype
    }
}

/// An object definition with its fields resolved.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    /// The object definition.
    pub object: ObjectDefinition,
    /// Resolved fields in object field order.
    pub fields: Vec<ResolvedField>,
}

impl ObjectSchema {
    /// Resolves `object` against field definitions supplied by `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a referenced field is missing (the
    /// registry never lets that happen) or its stored rules do not compile.
    pub fn resolve<'a>(
        object: ObjectDefinition,
        mut lookup: impl FnMut(&str) -> Option<&'a FieldDefinition>,
    ) -> SchemataResult<Self> {
        let mut fields = Vec::with_capacity(object.fields.len());
        for field_ref in &object.fields {
            let definition = lookup(&field_ref.field_short_name).ok_or_else(|| {
                SchemataError::InternalError(format!(
                    "Object '{}' references unknown field '{}'",
                    object.short_name, field_ref.field_short_name
                ))
            })?;
            fields.push(ResolvedField {
                mandatory: field_ref.mandatory_override.unwrap_or(definition.mandatory),
                rules: definition.compiled_rules()?,
                definition: definition.clone(),
            });
        }
        Ok(Self { object, fields })
    }

    /// The object's short name (its table name).
    pub fn name(&self) -> &str {
        &self.object.short_name
    }

    /// Looks up a resolved field by short name.
    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Returns `true` if `name` can be sorted on: an object field or a
    /// system column.
    pub fn is_sortable(&self, name: &str) -> bool {
        SYSTEM_COLUMNS.contains(&name) || self.field(name).is_some()
    }

    /// Columns of the instance table in select order.
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once("id")
            .chain(self.fields.iter().map(ResolvedField::name))
            .chain(["created_at", "updated_at"])
            .collect()
    }

    /// The fields free-text search runs over.
    pub fn searchable_fields(&self) -> &[String] {
        &self.object.display_properties.searchable_fields
    }

    /// The default sort column and order.
    pub fn default_sort(&self) -> (&str, SortOrder) {
        let display = &self.object.display_properties;
        (
            display.default_sort_field.as_deref().unwrap_or("id"),
            display.default_sort_order,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDraft;
    use crate::object::{DisplayProperties, ObjectDraft, ObjectFieldRef};
    use crate::rules::ValidationRule;
    use chrono::Utc;
    use std::collections::HashMap;

    fn fields() -> HashMap<String, FieldDefinition> {
        let now = Utc::now();
        [
            FieldDraft::new("email", "Email", Datatype::Email)
                .mandatory(true)
                .into_definition(now)
                .unwrap(),
            FieldDraft::new("name", "Name", Datatype::Text)
                .rule(ValidationRule::max_length(10))
                .into_definition(now)
                .unwrap(),
        ]
        .into_iter()
        .map(|f| (f.short_name.clone(), f))
        .collect()
    }

    #[test]
    fn test_resolve_applies_override_and_order() {
        let defs = fields();
        let object = ObjectDraft::new("customer", "Customer")
            .field(ObjectFieldRef::new("name", 0).mandatory(true))
            .field(ObjectFieldRef::new("email", 1).mandatory(false))
            .display(DisplayProperties {
                default_sort_field: Some("name".into()),
                default_sort_order: SortOrder::Desc,
                ..DisplayProperties::default()
            })
            .into_definition(Utc::now())
            .unwrap();
        let schema = ObjectSchema::resolve(object, |n| defs.get(n)).unwrap();

        assert_eq!(schema.name(), "customer");
        assert!(schema.field("name").unwrap().mandatory);
        assert!(!schema.field("email").unwrap().mandatory);
        assert_eq!(schema.field("name").unwrap().rules.len(), 1);
        assert_eq!(
            schema.columns(),
            vec!["id", "name", "email", "created_at", "updated_at"]
        );
        assert_eq!(schema.default_sort(), ("name", SortOrder::Desc));
        assert!(schema.is_sortable("created_at"));
        assert!(!schema.is_sortable("phone"));
    }

    #[test]
    fn test_resolve_unknown_field_is_internal() {
        let object = ObjectDraft::new("customer", "Customer")
            .field(ObjectFieldRef::new("ghost", 0))
            .into_definition(Utc::now())
            .unwrap();
        let err = ObjectSchema::resolve(object, |_| None).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_default_sort_falls_back_to_id() {
        let object = ObjectDraft::new("note", "Note").into_definition(Utc::now()).unwrap();
        let schema = ObjectSchema::resolve(object, |_| None).unwrap();
        assert_eq!(schema.default_sort(), ("id", SortOrder::Asc));
    }
}
