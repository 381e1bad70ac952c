//! Global template functions
//!
//! All functions are pure: the same arguments always produce the same
//! output, so a render is reproducible byte for byte.

use minijinja::value::{Rest, ValueKind};
use minijinja::{Error, ErrorKind, Value};

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn is_blank(value: &Value) -> bool {
    value.is_undefined() || value.is_none() || value.as_str().is_some_and(str::is_empty)
}

/// Abort the render with a message: `{{ fail("ingress.host must be set") }}`
pub fn fail(message: String) -> Result<Value, Error> {
    Err(invalid(message))
}

/// `dict("app", "web", "tier", "frontend")`
pub fn dict(pairs: Rest<Value>) -> Result<Value, Error> {
    if pairs.len() % 2 != 0 {
        return Err(invalid("dict expects key/value pairs"));
    }

    let mut map = serde_json::Map::new();
    for pair in pairs.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| invalid(format!("dict keys must be strings, got {}", pair[0].kind())))?;
        let value = serde_json::to_value(&pair[1]).map_err(|e| invalid(e.to_string()))?;
        map.insert(key.to_string(), value);
    }

    Ok(Value::from_serialize(serde_json::Value::Object(map)))
}

pub fn list(items: Rest<Value>) -> Value {
    Value::from(items.0)
}

/// `get(values.labels, "team", "platform")`
pub fn get(obj: Value, key: String, default: Option<Value>) -> Value {
    match obj.get_attr(&key) {
        Ok(v) if !v.is_undefined() => v,
        _ => default.unwrap_or(Value::UNDEFINED),
    }
}

/// Walk nested keys, returning the last argument when any is missing
///
/// `dig(values, "ingress", "tls", 0, "secretName", "none")`
pub fn dig(obj: Value, path_and_default: Rest<Value>) -> Result<Value, Error> {
    let Some((default, path)) = path_and_default.split_last() else {
        return Err(invalid("dig expects at least a default value"));
    };

    let mut current = obj;
    for key in path {
        let next = match key.kind() {
            ValueKind::String => current.get_attr(key.as_str().unwrap_or_default()),
            ValueKind::Number => current.get_item(key),
            other => return Err(invalid(format!("dig keys must be strings or integers, got {}", other))),
        };
        match next {
            Ok(v) if !v.is_undefined() && !v.is_none() => current = v,
            _ => return Ok(default.clone()),
        }
    }

    Ok(current)
}

/// First argument that is not undefined, null or `""`
pub fn coalesce(args: Rest<Value>) -> Value {
    args.0
        .into_iter()
        .find(|v| !is_blank(v))
        .unwrap_or(Value::UNDEFINED)
}

/// `ternary("yes", "no", values.enabled)`
pub fn ternary(when_true: Value, when_false: Value, condition: Value) -> Value {
    if condition.is_true() { when_true } else { when_false }
}

pub fn tostring(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None if value.is_none() || value.is_undefined() => String::new(),
        None => value.to_string(),
    }
}

pub fn toint(value: Value) -> Result<i64, Error> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(s) = value.as_str() {
        return s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(format!("toint: cannot convert '{}'", s)));
    }
    if value.kind() == ValueKind::Number {
        return f64::try_from(value).map(|f| f.trunc() as i64);
    }
    Err(invalid(format!("toint: cannot convert {}", value.kind())))
}

pub fn tofloat(value: Value) -> Result<f64, Error> {
    if let Some(s) = value.as_str() {
        return s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("tofloat: cannot convert '{}'", s)));
    }
    if value.kind() == ValueKind::Number {
        return f64::try_from(value);
    }
    Err(invalid(format!("tofloat: cannot convert {}", value.kind())))
}

/// Go-style formatting with `%s`, `%v`, `%d`, `%f`, `%q` and `%%`
pub fn printf(format: String, args: Rest<Value>) -> Result<String, Error> {
    let mut out = String::with_capacity(format.len());
    let mut args = args.0.into_iter();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let Some(verb) = chars.next() else {
            out.push('%');
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        let arg = args
            .next()
            .ok_or_else(|| invalid(format!("printf: missing argument for %{}", verb)))?;

        match verb {
            's' | 'v' => out.push_str(&tostring(arg)),
            'q' => out.push_str(&format!("{:?}", tostring(arg))),
            'd' => out.push_str(&toint(arg)?.to_string()),
            'f' => out.push_str(&format!("{:.6}", tofloat(arg)?)),
            other => return Err(invalid(format!("printf: unsupported verb %{}", other))),
        }
    }

    if args.next().is_some() {
        return Err(invalid("printf: too many arguments"));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::{Environment, context};

    fn env() -> Environment<'static> {
        let mut env = Environment::new();
        env.add_function("fail", fail);
        env.add_function("dict", dict);
        env.add_function("list", list);
        env.add_function("get", get);
        env.add_function("dig", dig);
        env.add_function("coalesce", coalesce);
        env.add_function("ternary", ternary);
        env.add_function("tostring", tostring);
        env.add_function("toint", toint);
        env.add_function("tofloat", tofloat);
        env.add_function("printf", printf);
        env
    }

    fn render(template: &str) -> String {
        let values = serde_json::json!({
            "ingress": {"tls": [{"secretName": "web-tls"}]},
            "labels": {"team": "payments"},
            "empty": "",
        });
        env().render_str(template, context! { values => values }).unwrap()
    }

    #[test]
    fn test_fail() {
        let err = env().render_str(r#"{{ fail("host must be set") }}"#, ()).unwrap_err();
        assert!(err.to_string().contains("host must be set"));
    }

    #[test]
    fn test_dict_and_list() {
        assert_eq!(render(r#"{{ dict("b", 2, "a", 1).a }}"#), "1");
        assert_eq!(render(r#"{{ dict("b", 2, "a", 1) | length }}"#), "2");
        assert_eq!(render(r#"{{ list(1, "two") | length }}"#), "2");
        assert!(env().render_str(r#"{{ dict("a") }}"#, ()).is_err());
    }

    #[test]
    fn test_get_and_dig() {
        assert_eq!(render(r#"{{ get(values.labels, "team") }}"#), "payments");
        assert_eq!(render(r#"{{ get(values.labels, "owner", "nobody") }}"#), "nobody");
        assert_eq!(
            render(r#"{{ dig(values, "ingress", "tls", 0, "secretName", "none") }}"#),
            "web-tls"
        );
        assert_eq!(
            render(r#"{{ dig(values, "ingress", "hosts", 0, "none") }}"#),
            "none"
        );
    }

    #[test]
    fn test_coalesce_and_ternary() {
        assert_eq!(render(r#"{{ coalesce(values.empty, values.missing, "fallback") }}"#), "fallback");
        assert_eq!(render(r#"{{ ternary("on", "off", true) }}"#), "on");
        assert_eq!(render(r#"{{ ternary("on", "off", values.empty) }}"#), "off");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(render(r#"{{ toint("8080") + 1 }}"#), "8081");
        assert_eq!(render(r#"{{ tofloat("0.5") * 2 }}"#), "1.0");
        assert_eq!(render(r#"{{ tostring(42) }}"#), "42");
        assert!(env().render_str(r#"{{ toint("eighty") }}"#, ()).is_err());
    }

    #[test]
    fn test_printf() {
        assert_eq!(render(r#"{{ printf("%s-%d", "web", 3) }}"#), "web-3");
        assert_eq!(render(r#"{{ printf("%q at 100%%", "ok") }}"#), r#""ok" at 100%"#);
        assert_eq!(render(r#"{{ printf("%f", 1.5) }}"#), "1.500000");
        assert!(env().render_str(r#"{{ printf("%s %s", "one") }}"#, ()).is_err());
        assert!(env().render_str(r#"{{ printf("%s", "one", "two") }}"#, ()).is_err());
    }
}
