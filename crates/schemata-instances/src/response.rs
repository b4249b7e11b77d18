//! Instances and list pages as returned to callers.

use chrono::{DateTime, Utc};
use schemata_core::SchemataResult;
use schemata_db::Row;
use schemata_schema::ObjectSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// One stored record of an object type.
///
/// Field values are flattened next to `id`, decoded to JSON by datatype and
/// kept in object field order; absent values are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Generated record id.
    pub id: i64,
    /// Field values keyed by field short name.
    #[serde(flatten)]
    pub values: Map<String, Json>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// Decodes a row selected with [`ObjectSchema::columns`].
    ///
    /// # Errors
    ///
    /// Returns an error if a system column is missing or malformed.
    pub fn from_row(schema: &ObjectSchema, row: &Row) -> SchemataResult<Self> {
        let mut values = Map::new();
        for field in &schema.fields {
            let value = row
                .get_value(field.name())
                .map_or(Json::Null, |v| field.datatype().decode(v));
            values.insert(field.name().to_string(), value);
        }
        Ok(Self {
            id: row.get("id")?,
            values,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&Json> {
        self.values.get(field)
    }
}

/// A page of instances with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePage {
    /// The instances on this page.
    pub results: Vec<Instance>,
    /// Total number of matching instances across all pages.
    pub count: u64,
    /// The current page number (1-indexed).
    pub page: u64,
    /// The number of items per page.
    pub page_size: u64,
    /// Total number of pages (at least 1).
    pub total_pages: u64,
    /// Whether there is a next page.
    pub has_next: bool,
    /// Whether there is a previous page.
    pub has_previous: bool,
}

impl InstancePage {
    /// Builds the page metadata around `results`.
    ///
    /// Pages past the end keep their requested number and carry no results.
    pub fn new(results: Vec<Instance>, count: u64, page: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = count.div_ceil(page_size).max(1);
        Self {
            results,
            count,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(id: i64) -> Instance {
        let mut values = Map::new();
        values.insert("name".into(), json!("Ada"));
        values.insert("age".into(), Json::Null);
        Instance {
            id,
            values,
            created_at: DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339("2024-06-02T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_instance_serializes_flat_in_order() {
        let json = serde_json::to_value(instance(7)).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["id", "name", "age", "createdAt", "updatedAt"]);
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["age"], Json::Null);
    }

    #[test]
    fn test_page_metadata() {
        let page = InstancePage::new(vec![instance(1), instance(2)], 5, 2, 2);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_previous);

        let last = InstancePage::new(vec![instance(5)], 5, 3, 2);
        assert!(!last.has_next);
    }

    #[test]
    fn test_empty_and_past_the_end() {
        let empty = InstancePage::new(Vec::new(), 0, 1, 20);
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_next && !empty.has_previous);

        let beyond = InstancePage::new(Vec::new(), 3, 9, 2);
        assert_eq!(beyond.page, 9);
        assert!(beyond.results.is_empty());
        assert!(!beyond.has_next);
        assert!(beyond.has_previous);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let json = serde_json::to_value(InstancePage::new(Vec::new(), 0, 1, 20)).unwrap();
        for key in ["results", "count", "page", "pageSize", "totalPages", "hasNext", "hasPrevious"] {
            assert!(json.get(key).is_some(), "{key}");
        }
    }
}
