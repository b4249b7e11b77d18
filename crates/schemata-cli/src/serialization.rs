//! JSON in and out of the command line.
//!
//! - [`JsonSerializer`] - Compact JSON output
//! - [`PrettyJsonSerializer`] - Indented JSON output
//! - [`read_json_arg`] - Parses a JSON argument, or a file named `@path`
//! - [`error_body`] - The JSON rendering of a failed command

use schemata::core::ValidationError;
use schemata::{SchemataError, SchemataResult};
use serde_json::{json, Value as Json};

/// Converts command results to and from text.
pub trait Serializer: Send + Sync {
    /// Serializes a JSON value into a string.
    fn serialize(&self, value: &Json) -> SchemataResult<String>;

    /// Parses a string into a JSON value.
    fn deserialize(&self, data: &str) -> SchemataResult<Json> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Compact JSON serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Json) -> SchemataResult<String> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Pretty-printed JSON serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJsonSerializer;

impl Serializer for PrettyJsonSerializer {
    fn serialize(&self, value: &Json) -> SchemataResult<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

/// Returns the serializer for the `--pretty` flag.
pub fn serializer(pretty: bool) -> Box<dyn Serializer> {
    if pretty {
        Box::new(PrettyJsonSerializer)
    } else {
        Box::new(JsonSerializer)
    }
}

/// Parses the JSON argument `name`. A value starting with `@` names a file
/// to read the JSON from.
///
/// # Errors
///
/// Returns a validation error on `name` for malformed JSON, and an I/O error
/// when the file cannot be read.
pub async fn read_json_arg(name: &str, raw: &str) -> SchemataResult<Json> {
    let text = match raw.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            SchemataError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to read {path}: {e}"),
            ))
        })?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| {
        ValidationError::field(name, "invalid_json", format!("Malformed JSON: {e}")).into()
    })
}

/// Renders an error as `{"error": {kind, status, message, fieldErrors?}}`.
pub fn error_body(error: &SchemataError) -> Json {
    let kind = error.kind();
    let mut body = json!({
        "kind": kind.as_str(),
        "status": kind.status_code(),
        "message": error.to_string(),
    });
    if let Some(validation) = error.validation() {
        if !validation.message.is_empty() {
            body["message"] = json!(validation.message);
        }
        body["fieldErrors"] = json!(validation.field_errors);
    }
    json!({ "error": body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata::core::FieldError;
    use std::io::Write;

    #[test]
    fn test_compact_and_pretty() {
        let value = json!({"shortName": "email", "mandatory": true});
        let compact = JsonSerializer.serialize(&value).unwrap();
        assert_eq!(compact, r#"{"shortName":"email","mandatory":true}"#);

        let pretty = serializer(true).serialize(&value).unwrap();
        assert!(pretty.contains("\n  \"shortName\": \"email\""));
        assert_eq!(PrettyJsonSerializer.deserialize(&pretty).unwrap(), value);
    }

    #[tokio::test]
    async fn test_read_json_arg_inline_and_file() {
        assert_eq!(read_json_arg("payload", r#"{"a":1}"#).await.unwrap(), json!({"a": 1}));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"b": [1, 2]}}"#).unwrap();
        let arg = format!("@{}", file.path().display());
        assert_eq!(read_json_arg("payload", &arg).await.unwrap(), json!({"b": [1, 2]}));
    }

    #[tokio::test]
    async fn test_read_json_arg_errors() {
        let err = read_json_arg("payload", "{not json").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.validation().unwrap().has_field("payload"));

        let err = read_json_arg("payload", "@/definitely/not/here.json")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_error_body() {
        let err: SchemataError = ValidationError::with_field_errors(vec![FieldError::new(
            "email",
            "required",
            "This field is required.",
        )])
        .into();
        let body = error_body(&err);
        assert_eq!(body["error"]["kind"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["status"], 400);
        assert_eq!(body["error"]["fieldErrors"][0]["field"], "email");

        let body = error_body(&SchemataError::NotFound("Object 'x' not found".into()));
        assert_eq!(body["error"]["kind"], "NOT_FOUND");
        assert!(body["error"].get("fieldErrors").is_none());
    }
}
