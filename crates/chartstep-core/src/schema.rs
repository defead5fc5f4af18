//! Step payload schema
//!
//! The JSON Schema describing every verb payload is embedded in the binary.
//! It is printed by the `schema` command and used to reject malformed
//! payloads before anything runs.

use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

const SCHEMA: &str = include_str!("../schema/schema.json");

/// The embedded schema document
pub fn schema() -> &'static str {
    SCHEMA
}

/// Validates YAML payloads against the embedded schema
pub struct PayloadValidator {
    compiled: jsonschema::Validator,
}

impl PayloadValidator {
    pub fn new() -> Result<Self> {
        let document: JsonValue = serde_json::from_str(SCHEMA)?;
        let compiled =
            jsonschema::validator_for(&document).map_err(|e| CoreError::InvalidSchema {
                message: e.to_string(),
            })?;
        Ok(Self { compiled })
    }

    /// Check a payload, reporting every violation
    pub fn validate(&self, payload: &str) -> Result<()> {
        let document: serde_yaml::Value = serde_yaml::from_str(payload)?;
        let instance = match document {
            serde_yaml::Value::Null => JsonValue::Object(Default::default()),
            other => serde_json::to_value(other)?,
        };

        if self.compiled.is_valid(&instance) {
            return Ok(());
        }

        let violations = self
            .compiled
            .iter_errors(&instance)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        Err(CoreError::SchemaViolation { violations })
    }
}

/// Validate a payload against the embedded schema
pub fn validate_payload(payload: &str) -> Result<()> {
    PayloadValidator::new()?.validate(payload)
}
