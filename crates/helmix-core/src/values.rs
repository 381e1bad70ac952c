//! Values handling with deep merge support

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    ///
    /// Fails with `ValuesNotFound` when the file is missing and with
    /// `InvalidValues` when it is not a YAML mapping.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CoreError::ValuesNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            CoreError::YamlParse(err) => CoreError::InvalidValues {
                path: path.display().to_string(),
                message: err.to_string(),
            },
            CoreError::InvalidValues { message, .. } => CoreError::InvalidValues {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse values from YAML string
    ///
    /// An empty (or comment-only) document is an empty mapping.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if is_blank_yaml(yaml) {
            return Ok(Self::new());
        }
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse values from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    fn from_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::InvalidValues {
                path: "<inline>".to_string(),
                message: format!("top level must be a mapping, got {}", type_name(&other)),
            }),
        }
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    /// - Null: overlay replaces base
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Merge multiple values in order, the last one winning
    pub fn merge_all(values: Vec<Values>) -> Self {
        let mut result = Values::new();
        for v in values {
            result.merge(&v);
        }
        result
    }

    /// Set a value by dotted path (e.g., "image.tag")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::ValuesMerge {
                message: format!("Invalid key path: '{}'", path),
            });
        }
        set_nested(&mut self.0, &parts, value);
        Ok(())
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Top-level keys, sorted
    pub fn keys(&self) -> Vec<String> {
        match &self.0 {
            JsonValue::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Merge with schema defaults applied first
    ///
    /// The merge order is: schema defaults (lowest priority) -> base values (higher priority)
    pub fn with_schema_defaults(schema_defaults: Values, base: Values) -> Self {
        let mut result = schema_defaults;
        if result.0.is_null() {
            result = Values::new();
        }
        result.merge(&base);
        result
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

fn is_blank_yaml(yaml: &str) -> bool {
    yaml.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Set a nested value by path
fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = value {
        if remaining.is_empty() {
            map.insert(key.to_string(), new_value);
        } else {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
            set_nested(entry, remaining, new_value);
        }
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        JsonValue::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

/// Parse --set arguments (key=value format)
///
/// `true`, `false`, `null`, plain integers and JSON lists or maps are typed.
/// Everything else, decimals included, stays a string so `image.tag=1.10`
/// is not read as the number 1.1.
pub fn parse_set_values(set_args: &[String]) -> Result<Values> {
    let mut values = Values::new();

    for arg in set_args {
        let (key, val) = arg.split_once('=').ok_or_else(|| CoreError::ValuesMerge {
            message: format!("Invalid --set format: '{}'. Expected key=value", arg),
        })?;

        values.set(key.trim(), parse_scalar(val))?;
    }

    Ok(values)
}

fn parse_scalar(val: &str) -> JsonValue {
    if val == "true" {
        JsonValue::Bool(true)
    } else if val == "false" {
        JsonValue::Bool(false)
    } else if val == "null" {
        JsonValue::Null
    } else if let Some(num) = val.parse::<i64>().ok().filter(|n| n.to_string() == val) {
        JsonValue::Number(num.into())
    } else if val.starts_with('[') || val.starts_with('{') {
        serde_json::from_str(val).unwrap_or_else(|_| JsonValue::String(val.to_string()))
    } else {
        JsonValue::String(val.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_merge() {
        let mut base = Values::from_yaml(
            r#"
image:
  repository: nginx
  tag: "1.0"
replicas: 1
"#,
        )
        .unwrap();

        let overlay = Values::from_yaml(
            r#"
image:
  tag: "2.0"
  pullPolicy: Always
replicas: 3
"#,
        )
        .unwrap();

        base.merge(&overlay);

        assert_eq!(base.get("image.repository").unwrap(), "nginx");
        assert_eq!(base.get("image.tag").unwrap(), "2.0");
        assert_eq!(base.get("image.pullPolicy").unwrap(), "Always");
        assert_eq!(base.get("replicas").unwrap(), 3);
    }

    #[test]
    fn test_defaults_then_overrides_yaml() {
        let defaults =
            Values::from_yaml("image:\n  pullPolicy: IfNotPresent\nservice:\n  type: ClusterIP\n").unwrap();
        let base = Values::from_yaml("image:\n  repository: nginx\nservice:\n  port: 8080\n").unwrap();

        let mut merged = Values::with_schema_defaults(defaults, base);
        merged.merge(&parse_set_values(&["image.repository=registry.local/nginx".to_string()]).unwrap());

        insta::assert_snapshot!(merged.to_yaml().unwrap(), @r"
        image:
          pullPolicy: IfNotPresent
          repository: registry.local/nginx
        service:
          port: 8080
          type: ClusterIP
        ");
    }

    #[test]
    fn test_lists_are_replaced_not_concatenated() {
        let mut base = Values::from_yaml("hosts: [a.example.com, b.example.com]").unwrap();
        let overlay = Values::from_yaml("hosts: [c.example.com]").unwrap();

        base.merge(&overlay);

        assert_eq!(base.get("hosts").unwrap(), &serde_json::json!(["c.example.com"]));
    }

    #[test]
    fn test_null_overrides_base() {
        let mut base = Values::from_yaml("resources:\n  limits:\n    cpu: 1").unwrap();
        let overlay = Values::from_yaml("resources: null").unwrap();

        base.merge(&overlay);

        assert!(base.get("resources").unwrap().is_null());
    }

    #[test]
    fn test_merge_all_last_wins() {
        let merged = Values::merge_all(vec![
            Values::from_yaml("tier: common\nport: 80").unwrap(),
            Values::from_yaml("tier: staging").unwrap(),
            Values::from_yaml("tier: production").unwrap(),
        ]);

        assert_eq!(merged.get("tier").unwrap(), "production");
        assert_eq!(merged.get("port").unwrap(), 80);
    }

    #[test]
    fn test_empty_and_comment_only_yaml() {
        assert!(Values::from_yaml("").unwrap().is_empty());
        assert!(Values::from_yaml("# nothing here\n\n").unwrap().is_empty());
        assert!(Values::from_yaml("~").unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_rejected() {
        let err = Values::from_yaml("- a\n- b").unwrap_err();
        assert!(err.to_string().contains("top level must be a mapping"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Values::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, CoreError::ValuesNotFound { .. }));
    }

    #[test]
    fn test_from_file_malformed_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "image: [unclosed").unwrap();

        let err = Values::from_file(&path).unwrap_err();
        match err {
            CoreError::InvalidValues { path: p, .. } => assert!(p.ends_with("broken.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_set_nested() {
        let mut values = Values::new();
        values.set("image.tag", JsonValue::String("v1".into())).unwrap();
        values.set("replicas", JsonValue::Number(3.into())).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v1");
        assert_eq!(values.get("replicas").unwrap(), 3);
    }

    #[test]
    fn test_set_rejects_empty_segment() {
        let mut values = Values::new();
        assert!(values.set("image..tag", JsonValue::Null).is_err());
    }

    #[test]
    fn test_get_list_index() {
        let values = Values::from_yaml("ports:\n  - name: http\n    port: 80").unwrap();
        assert_eq!(values.get("ports.0.port").unwrap(), 80);
        assert!(values.get("ports.3.port").is_none());
    }

    #[test]
    fn test_parse_set_values() {
        let args = vec![
            "image.tag=v2".to_string(),
            "replicas=5".to_string(),
            "debug=true".to_string(),
            "ratio=0.5".to_string(),
            "offset=-3".to_string(),
            "hosts=[\"a\",\"b\"]".to_string(),
            "empty=".to_string(),
        ];

        let values = parse_set_values(&args).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v2");
        assert_eq!(values.get("replicas").unwrap(), 5);
        assert_eq!(values.get("debug").unwrap(), true);
        assert_eq!(values.get("ratio").unwrap(), "0.5");
        assert_eq!(values.get("offset").unwrap(), -3);
        assert_eq!(values.get("hosts").unwrap(), &serde_json::json!(["a", "b"]));
        assert_eq!(values.get("empty").unwrap(), "");
    }

    #[test]
    fn test_set_version_like_values_stay_strings() {
        let args = vec![
            "image.tag=1.10".to_string(),
            "appVersion=2.0".to_string(),
            "zone=007".to_string(),
            "exp=1e3".to_string(),
        ];

        let values = parse_set_values(&args).unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "1.10");
        assert_eq!(values.get("appVersion").unwrap(), "2.0");
        assert_eq!(values.get("zone").unwrap(), "007");
        assert_eq!(values.get("exp").unwrap(), "1e3");
    }

    #[test]
    fn test_parse_set_values_requires_equals() {
        let err = parse_set_values(&["replicas".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Expected key=value"));
    }

    #[test]
    fn test_with_schema_defaults() {
        let defaults = Values::from_yaml("replicas: 1\nimage:\n  tag: latest").unwrap();
        let base = Values::from_yaml("image:\n  tag: \"1.25\"").unwrap();

        let merged = Values::with_schema_defaults(defaults, base);

        assert_eq!(merged.get("replicas").unwrap(), 1);
        assert_eq!(merged.get("image.tag").unwrap(), "1.25");
    }
}
