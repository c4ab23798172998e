use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{PathError, Result};

/// JSON Schema (2020-12) for route documents.
pub const ROUTE_SCHEMA: &str = r##"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "oneOf": [
    { "$ref": "#/$defs/route" },
    { "type": "array", "items": { "$ref": "#/$defs/route" } }
  ],
  "$defs": {
    "path": { "type": "string", "minLength": 1 },
    "route": {
      "type": "object",
      "required": ["source"],
      "anyOf": [
        { "required": ["destination"] },
        { "required": ["path"] }
      ],
      "properties": {
        "destination": { "$ref": "#/$defs/path" },
        "path": { "$ref": "#/$defs/path" },
        "source": { "$ref": "#/$defs/source" }
      }
    },
    "source": {
      "anyOf": [
        { "$ref": "#/$defs/path" },
        {
          "type": "object",
          "required": ["child"],
          "properties": { "child": { "$ref": "#/$defs/source" } }
        }
      ]
    }
  }
}"##;

/// [`ROUTE_SCHEMA`], compiled on first use.
static ROUTE_VALIDATOR: LazyLock<std::result::Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(ROUTE_SCHEMA).map_err(|err| format!("route schema: {err}"))?;
    jsonschema::validator_for(&schema).map_err(|err| format!("route schema: {err}"))
});

/// Check a parsed route document against [`ROUTE_SCHEMA`].
pub fn validate_route_document(document: &Value) -> Result<()> {
    let validator = ROUTE_VALIDATOR
        .as_ref()
        .map_err(|err| PathError::InvalidRoute(err.clone()))?;

    let mut errors = validator.iter_errors(document);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(PathError::InvalidRoute(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_string_and_nested_sources() {
        validate_route_document(&json!({"destination": "/a", "source": "/b"})).unwrap();
        validate_route_document(&json!([
            {"path": "/a", "source": {"child": {"child": "/b"}}}
        ]))
        .unwrap();
    }

    #[test]
    fn reports_missing_destination() {
        let err = validate_route_document(&json!({"source": "/b"})).unwrap_err();
        assert!(matches!(err, PathError::InvalidRoute(_)));
    }

    #[test]
    fn route_schema_compiles_once_and_is_reused() {
        assert!(ROUTE_VALIDATOR.is_ok());
        let first: *const _ = ROUTE_VALIDATOR.as_ref().unwrap();
        validate_route_document(&json!({"destination": "/a", "source": "/b"})).unwrap();
        let second: *const _ = ROUTE_VALIDATOR.as_ref().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_empty_paths() {
        assert!(validate_route_document(&json!({"destination": "", "source": "/b"})).is_err());
    }
}
