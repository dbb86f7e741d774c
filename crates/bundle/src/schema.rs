//! JSON schema for the bundle manifest.

/// JSON Schema for the manifest entry.
pub const MANIFEST_SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "$id": "https://scangate.dev/schemas/manifest.json",
  "title": "Scangate Bundle Manifest",
  "type": "object",
  "required": ["createdAt", "version", "files"],
  "properties": {
    "createdAt": {
      "type": "string",
      "format": "date-time"
    },
    "version": {
      "type": "string",
      "minLength": 1
    },
    "files": {
      "type": "object",
      "additionalProperties": {
        "type": "object",
        "required": ["addedAt", "properties", "digest"],
        "properties": {
          "addedAt": {
            "type": "string",
            "format": "date-time"
          },
          "properties": {
            "type": "object",
            "additionalProperties": { "type": "string" }
          },
          "digest": {
            "type": "string",
            "pattern": "^[0-9a-f]{64}$"
          }
        }
      }
    }
  }
}"#;

/// Get the manifest schema as a parsed JSON value.
pub fn manifest_schema() -> serde_json::Value {
    serde_json::from_str(MANIFEST_SCHEMA).expect("Invalid manifest schema")
}
