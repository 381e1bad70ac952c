//! Values schema validation
//!
//! A project may ship `values.schema.json` or `values.schema.yaml` (JSON
//! Schema written in either syntax). The merged values are validated
//! against it and its `default`s sit below every values source.

use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result, ValidationErrorInfo};
use crate::values::Values;

/// A parsed JSON Schema document
#[derive(Debug, Clone)]
pub struct Schema(JsonValue);

impl Schema {
    /// Load a schema, parsing YAML unless the file ends in `.json`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let value: JsonValue = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content).map_err(|e| CoreError::InvalidSchema {
                message: format!("{}: {}", path.display(), e),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidSchema {
                message: format!("{}: {}", path.display(), e),
            })?
        };

        Self::from_value(value)
    }

    /// Load from a JSON Schema string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    fn from_value(value: JsonValue) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidSchema {
                message: "schema must be an object".to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    /// Collect `default` values from the schema's property tree
    pub fn extract_defaults(&self) -> JsonValue {
        extract_defaults_recursive(&self.0)
    }

    pub fn defaults_as_values(&self) -> Values {
        match self.extract_defaults() {
            JsonValue::Object(map) => Values(JsonValue::Object(map)),
            _ => Values::new(),
        }
    }
}

fn extract_defaults_recursive(schema: &JsonValue) -> JsonValue {
    let Some(obj) = schema.as_object() else {
        return JsonValue::Null;
    };

    if let Some(default) = obj.get("default") {
        return default.clone();
    }

    // `properties` without an explicit type still describes an object
    let is_object = match obj.get("type") {
        Some(JsonValue::String(t)) => t == "object",
        None => obj.contains_key("properties"),
        _ => false,
    };

    if is_object {
        if let Some(props) = obj.get("properties").and_then(|p| p.as_object()) {
            let defaults: serde_json::Map<String, JsonValue> = props
                .iter()
                .map(|(key, prop)| (key.clone(), extract_defaults_recursive(prop)))
                .filter(|(_, value)| !value.is_null())
                .collect();

            if !defaults.is_empty() {
                return JsonValue::Object(defaults);
            }
        }
    }

    JsonValue::Null
}

/// Result of schema validation
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationErrorInfo>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn failure(errors: Vec<ValidationErrorInfo>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// Schema validator with cached compiled schema
pub struct SchemaValidator {
    schema: Schema,
    compiled: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Result<Self> {
        let compiled =
            jsonschema::validator_for(schema.as_json()).map_err(|e| CoreError::InvalidSchema {
                message: e.to_string(),
            })?;

        Ok(Self { schema, compiled })
    }

    /// Validate values, reporting every violation
    pub fn validate(&self, values: &JsonValue) -> ValidationResult {
        if self.compiled.is_valid(values) {
            return ValidationResult::success();
        }

        let mut errors: Vec<ValidationErrorInfo> = self
            .compiled
            .iter_errors(values)
            .map(|e| {
                let path = e.instance_path.to_string();
                ValidationErrorInfo {
                    path: if path.is_empty() {
                        "(root)".to_string()
                    } else {
                        path
                    },
                    message: e.to_string().replace('"', "'"),
                }
            })
            .collect();
        errors.sort_by(|a, b| a.path.cmp(&b.path));

        ValidationResult::failure(errors)
    }

    pub fn defaults_as_values(&self) -> Values {
        self.schema.defaults_as_values()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}
