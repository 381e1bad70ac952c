//! Template filters for Kubernetes manifests
//!
//! Registered on every environment built by [`crate::Engine`]. The names
//! follow the Helm/Sprig functions people already know (`toyaml`,
//! `nindent`, `b64encode`, ...) in Jinja spelling.

use base64::Engine as _;
use minijinja::value::{Kwargs, ValueKind};
use minijinja::{Error, ErrorKind, Value};
use semver::{Version, VersionReq};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn to_json(value: &Value) -> Result<JsonValue, Error> {
    serde_json::to_value(value).map_err(|e| invalid(e.to_string()))
}

/// String form of a value without the quotes `Display` adds to strings
fn plain_string(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// `{{ values.resources | toyaml }}`
///
/// Emits block-style YAML without the document marker or trailing newline,
/// ready to be piped into `nindent`.
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))
}

pub fn tojson_pretty(value: Value) -> Result<String, Error> {
    serde_json::to_string_pretty(&to_json(&value)?).map_err(|e| invalid(e.to_string()))
}

pub fn b64encode(value: Value) -> String {
    base64::engine::general_purpose::STANDARD.encode(plain_string(&value))
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| invalid(format!("b64decode: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("b64decode: {}", e)))
}

/// Double-quote a value, escaping `\` and `"`
pub fn quote(value: Value) -> String {
    let s = if value.is_undefined() || value.is_none() {
        String::new()
    } else {
        plain_string(&value)
    };
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Single-quote a value, YAML style (`'` doubled)
pub fn squote(value: Value) -> String {
    let s = if value.is_undefined() || value.is_none() {
        String::new()
    } else {
        plain_string(&value)
    };
    format!("'{}'", s.replace('\'', "''"))
}

/// Indent every non-empty line by `spaces`
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`indent`], with a leading newline
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Fail rendering when the value is missing, null or an empty string
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(|s| s.is_empty());

    if missing {
        Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}

/// True for undefined, null, `""`, `[]` and `{}`
pub fn empty(value: Value) -> bool {
    if value.is_undefined() || value.is_none() {
        return true;
    }
    match value.kind() {
        ValueKind::String | ValueKind::Seq | ValueKind::Map => value.len() == Some(0),
        _ => false,
    }
}

pub fn haskey(value: Value, key: String) -> bool {
    value
        .get_attr(&key)
        .map(|v| !v.is_undefined())
        .unwrap_or(false)
}

pub fn keys(value: Value) -> Result<Vec<String>, Error> {
    if value.kind() != ValueKind::Map {
        return Err(invalid(format!(
            "keys: expected a mapping, got {}",
            value.kind()
        )));
    }
    Ok(value.try_iter()?.map(|k| plain_string(&k)).collect())
}

/// Deep merge: maps recurse, everything else in `overlay` wins
pub fn merge(base: Value, overlay: Value) -> Result<Value, Error> {
    let mut merged = to_json(&base)?;
    merge_json(&mut merged, &to_json(&overlay)?);
    Ok(Value::from_serialize(&merged))
}

fn merge_json(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base), JsonValue::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Hex SHA-256 digest, handy for `checksum/config` annotations
pub fn sha256(value: Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain_string(&value).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Keep at most `length` characters
pub fn trunc(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

pub fn trimprefix(value: String, prefix: String) -> String {
    value
        .strip_prefix(prefix.as_str())
        .map(str::to_string)
        .unwrap_or(value)
}

pub fn trimsuffix(value: String, suffix: String) -> String {
    value
        .strip_suffix(suffix.as_str())
        .map(str::to_string)
        .unwrap_or(value)
}

/// `myAppName` / `My-App Name` → `my_app_name`
pub fn snakecase(value: String) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev_lower_or_digit = false;

    for c in value.chars() {
        if c.is_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = false;
        } else if c == '-' || c == ' ' || c == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_alphanumeric();
        }
    }

    out
}

pub fn kebabcase(value: String) -> String {
    snakecase(value).replace('_', "-")
}

/// Stringify every element of a list
///
/// Accepts `prefix`, `suffix` and `skip_empty` keyword arguments:
/// `{{ values.ports | tostrings(suffix="/TCP") | join(",") }}`
pub fn tostrings(value: Value, kwargs: Kwargs) -> Result<Vec<String>, Error> {
    let prefix: Option<String> = kwargs.get("prefix")?;
    let suffix: Option<String> = kwargs.get("suffix")?;
    let skip_empty: Option<bool> = kwargs.get("skip_empty")?;
    kwargs.assert_all_used()?;

    let prefix = prefix.unwrap_or_default();
    let suffix = suffix.unwrap_or_default();
    let skip_empty = skip_empty.unwrap_or(false);

    let items: Vec<Value> = match value.kind() {
        ValueKind::Seq | ValueKind::Iterable => value.try_iter()?.collect(),
        _ => vec![value],
    };

    Ok(items
        .into_iter()
        .map(|v| {
            if v.is_undefined() || v.is_none() {
                String::new()
            } else {
                plain_string(&v)
            }
        })
        .filter(|s| !(skip_empty && s.is_empty()))
        .map(|s| format!("{}{}{}", prefix, s, suffix))
        .collect())
}

/// `{{ "v1.29.3" | semver_match(">=1.28") }}`
///
/// A leading `v` and Kubernetes-style `-0` pre-release suffixes are
/// tolerated; missing minor/patch components count as zero.
pub fn semver_match(version: Value, constraint: String) -> Result<bool, Error> {
    let raw = version
        .as_str()
        .ok_or_else(|| invalid("semver_match: version must be a string"))?;
    let version = parse_loose_version(raw)
        .ok_or_else(|| invalid(format!("semver_match: invalid version '{}'", raw)))?;

    let constraint = constraint.trim();
    let req = VersionReq::parse(constraint)
        .or_else(|_| VersionReq::parse(constraint.trim_end_matches("-0")))
        .map_err(|e| invalid(format!("semver_match: invalid constraint '{}': {}", constraint, e)))?;

    Ok(req.matches(&version))
}

fn parse_loose_version(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }

    let core = raw.split(['-', '+']).next().unwrap_or(raw);
    let mut nums = core.split('.').map(|p| p.parse::<u64>());
    let major = nums.next()?.ok()?;
    let minor = nums.next().transpose().ok()?.unwrap_or(0);
    let patch = nums.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Integer conversion that also accepts numeric strings and floats
pub fn int(value: Value) -> Result<i64, Error> {
    match value.kind() {
        ValueKind::Number => match value.as_i64() {
            Some(n) => Ok(n),
            None => f64::try_from(value).map(|f| f.trunc() as i64),
        },
        ValueKind::String => {
            let s = value.as_str().unwrap_or_default().trim();
            s.parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|f| f.trunc() as i64))
                .map_err(|_| invalid(format!("int: cannot parse '{}'", s)))
        }
        ValueKind::Bool => Ok(i64::from(value.is_true())),
        other => Err(invalid(format!("int: cannot convert {}", other))),
    }
}

pub fn float(value: Value) -> Result<f64, Error> {
    match value.kind() {
        ValueKind::Number => f64::try_from(value),
        ValueKind::String => {
            let s = value.as_str().unwrap_or_default().trim();
            s.parse::<f64>()
                .map_err(|_| invalid(format!("float: cannot parse '{}'", s)))
        }
        ValueKind::Bool => Ok(if value.is_true() { 1.0 } else { 0.0 }),
        other => Err(invalid(format!("float: cannot convert {}", other))),
    }
}
