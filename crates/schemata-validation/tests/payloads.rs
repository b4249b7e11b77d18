//! Payload validation against schemas loaded through the registries.

use schemata_db::{DbExecutor, Value};
use schemata_db_backends::SqliteBackend;
use schemata_schema::{
    Datatype, FieldDraft, ObjectDraft, ObjectFieldRef, ObjectRegistry, SchemaContext,
    ValidationRule,
};
use schemata_validation::{validate_payload, ValidationMode};
use serde_json::json;
use std::sync::Arc;

async fn registry_with_every_datatype() -> ObjectRegistry {
    let db: Arc<dyn DbExecutor> = Arc::new(SqliteBackend::memory().unwrap());
    let ctx = SchemaContext::bootstrap(db).await.unwrap();
    let fields = ctx.fields();
    let objects = ctx.objects();

    let drafts = vec![
        FieldDraft::new("title", "Title", Datatype::Text)
            .mandatory(true)
            .rule(ValidationRule::min_length(3)),
        FieldDraft::new("body", "Body", Datatype::LongText),
        FieldDraft::new("contact", "Contact", Datatype::Email),
        FieldDraft::new("homepage", "Homepage", Datatype::Url),
        FieldDraft::new("phone", "Phone", Datatype::Phone),
        FieldDraft::new("quantity", "Quantity", Datatype::Integer)
            .rule(ValidationRule::max_value(100.0)),
        FieldDraft::new("price", "Price", Datatype::Decimal),
        FieldDraft::new("active", "Active", Datatype::Boolean),
        FieldDraft::new("due", "Due", Datatype::Date),
        FieldDraft::new("seen_at", "Seen at", Datatype::Datetime),
        FieldDraft::new("status", "Status", Datatype::Select).options(["open", "closed"]),
        FieldDraft::new("tags", "Tags", Datatype::MultiSelect)
            .options(["a", "b", "c"])
            .rule(ValidationRule::max_length(2)),
        FieldDraft::new("parent", "Parent", Datatype::Reference).references("item"),
    ];
    let mut object = ObjectDraft::new("item", "Item");
    for (i, draft) in drafts.into_iter().enumerate() {
        let field = fields.register(draft).await.unwrap();
        object = object.field(ObjectFieldRef::new(field.short_name, i as i64));
    }
    objects.register(object).await.unwrap();
    objects
}

#[tokio::test]
async fn test_every_datatype_normalizes() {
    let objects = registry_with_every_datatype().await;
    let schema = objects.schema("item").await.unwrap();
    let cleaned = validate_payload(
        &schema,
        &json!({
            "title": "  Widget ",
            "body": 12,
            "contact": "ops@example.com",
            "homepage": "https://example.com",
            "phone": "+44 20 7946 0000",
            "quantity": "7",
            "price": "9.99",
            "active": "yes",
            "due": "2024-12-31",
            "seen_at": "2024-12-31 08:15",
            "status": "open",
            "tags": "a,b",
            "parent": 1
        }),
        ValidationMode::Create,
    )
    .unwrap();

    let names: Vec<&str> = cleaned.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, schema.fields.iter().map(|f| f.name()).collect::<Vec<_>>());
    let value = |name: &str| cleaned.iter().find(|(n, _)| n == name).unwrap().1.clone();
    assert_eq!(value("title"), Value::String("Widget".into()));
    assert_eq!(value("body"), Value::String("12".into()));
    assert_eq!(value("quantity"), Value::Int(7));
    assert_eq!(value("price"), Value::Float(9.99));
    assert_eq!(value("active"), Value::Bool(true));
    assert!(matches!(value("due"), Value::Date(_)));
    assert!(matches!(value("seen_at"), Value::DateTime(_)));
    assert_eq!(value("tags"), Value::Json(json!(["a", "b"])));
    assert_eq!(value("parent"), Value::Int(1));
}

#[tokio::test]
async fn test_failures_reported_per_field() {
    let objects = registry_with_every_datatype().await;
    let schema = objects.schema("item").await.unwrap();
    let err = validate_payload(
        &schema,
        &json!({
            "title": "ab",
            "quantity": 101,
            "status": "pending",
            "tags": ["a", "b", "c"],
            "parent": "zero"
        }),
        ValidationMode::Create,
    )
    .unwrap_err();

    let codes: Vec<(&str, &str)> = err
        .field_errors
        .iter()
        .map(|e| (e.field.as_str(), e.code.as_str()))
        .collect();
    assert_eq!(
        codes,
        vec![
            ("title", "min_length"),
            ("quantity", "max_value"),
            ("status", "invalid_choice"),
            ("tags", "max_length"),
            ("parent", "invalid"),
        ]
    );
}

#[tokio::test]
async fn test_mandatory_override_applies() {
    let objects = registry_with_every_datatype().await;
    let patch = schemata_schema::ObjectPatch::from_json(json!({
        "fields": [
            {"fieldShortName": "title", "mandatoryOverride": false, "order": 0},
            {"fieldShortName": "contact", "mandatoryOverride": true, "order": 1}
        ]
    }))
    .unwrap();
    objects.update("item", patch).await.unwrap();
    let schema = objects.schema("item").await.unwrap();

    let err = validate_payload(&schema, &json!({}), ValidationMode::Create).unwrap_err();
    assert_eq!(err.field_errors.len(), 1);
    assert_eq!(err.field_errors[0].field, "contact");
}
