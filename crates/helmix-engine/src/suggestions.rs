//! "Did you mean" hints for template errors
//!
//! Names are compared with Levenshtein distance (via `strsim`) against the
//! registered filters and functions, the top-level context variables, and
//! the keys that actually exist in the merged values.

use serde_json::Value as JsonValue;

/// Candidates further away than this are not worth suggesting
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Filters registered by [`crate::Engine`] plus the MiniJinja built-ins
pub const AVAILABLE_FILTERS: &[&str] = &[
    // helmix
    "toyaml",
    "tojson",
    "tojson_pretty",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "nindent",
    "indent",
    "required",
    "empty",
    "haskey",
    "keys",
    "merge",
    "sha256",
    "trunc",
    "trimprefix",
    "trimsuffix",
    "snakecase",
    "kebabcase",
    "tostrings",
    "semver_match",
    "int",
    "float",
    // MiniJinja built-ins
    "default",
    "upper",
    "lower",
    "title",
    "capitalize",
    "replace",
    "trim",
    "join",
    "first",
    "last",
    "length",
    "reverse",
    "sort",
    "unique",
    "map",
    "select",
    "reject",
    "selectattr",
    "rejectattr",
    "batch",
    "slice",
    "dictsort",
    "items",
    "attr",
    "abs",
    "round",
    "string",
    "list",
    "bool",
    "safe",
    "escape",
    "urlencode",
];

/// Global functions registered by [`crate::Engine`] plus the built-ins
pub const AVAILABLE_FUNCTIONS: &[&str] = &[
    "fail",
    "dict",
    "list",
    "get",
    "dig",
    "coalesce",
    "ternary",
    "tostring",
    "toint",
    "tofloat",
    "printf",
    "range",
    "cycler",
    "joiner",
    "namespace",
];

/// Top-level names every template can use
pub const CONTEXT_VARIABLES: &[&str] = &["values", "env", "project", "template"];

/// Common misspellings of the context variables
const CONTEXT_ALIASES: &[(&str, &str)] = &[
    ("value", "values"),
    ("Values", "values"),
    ("environment", "env"),
    ("Release", "env"),
    ("release", "env"),
    ("Chart", "project"),
    ("chart", "project"),
];

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub text: String,
    pub distance: usize,
}

/// Candidates within [`MAX_SUGGESTION_DISTANCE`], closest first
pub fn find_closest_matches(input: &str, candidates: &[&str], max_results: usize) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .map(|&candidate| Suggestion {
            text: candidate.to_string(),
            distance: strsim::levenshtein(input, candidate),
        })
        .filter(|s| s.distance > 0 && s.distance <= MAX_SUGGESTION_DISTANCE)
        .collect();

    suggestions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.text.cmp(&b.text)));
    suggestions.truncate(max_results);
    suggestions
}

fn or_list(matches: &[Suggestion], prefix: &str) -> String {
    matches
        .iter()
        .map(|m| {
            if prefix.is_empty() {
                format!("`{}`", m.text)
            } else {
                format!("`{}.{}`", prefix, m.text)
            }
        })
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Hint for an undefined top-level name or values path
///
/// `expression` is the expression as written in the template, e.g.
/// `values.image.tga` or `Values.replicas`.
pub fn suggest_undefined(expression: &str, values: Option<&JsonValue>) -> String {
    let mut parts = expression.split('.');
    let root = parts.next().unwrap_or_default();

    if let Some((_, correct)) = CONTEXT_ALIASES.iter().find(|(alias, _)| *alias == root) {
        let rest: Vec<&str> = parts.collect();
        let corrected = if rest.is_empty() {
            correct.to_string()
        } else {
            format!("{}.{}", correct, rest.join("."))
        };
        return format!("Did you mean `{}`?", corrected);
    }

    if root == "values" {
        if let Some(values) = values {
            let path: Vec<&str> = parts.collect();
            if let Some(hint) = suggest_missing_key(&path, values) {
                return hint;
            }
        }
    } else if !CONTEXT_VARIABLES.contains(&root) {
        let matches = find_closest_matches(root, CONTEXT_VARIABLES, 1);
        if !matches.is_empty() {
            return format!("Did you mean {}?", or_list(&matches, ""));
        }
    }

    format!(
        "`{}` is not defined. Check the spelling, or use `| default(...)` for optional keys.",
        expression
    )
}

/// Walk `path` through `values` and describe the first missing segment
fn suggest_missing_key(path: &[&str], values: &JsonValue) -> Option<String> {
    let mut current = values;
    let mut walked = vec!["values"];

    for part in path {
        match current.get(part) {
            Some(next) => {
                walked.push(part);
                current = next;
            }
            None => {
                let obj = current.as_object()?;
                let available: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
                let prefix = walked.join(".");
                let matches = find_closest_matches(part, &available, 3);

                return Some(if matches.is_empty() {
                    format!(
                        "Key `{}` not found in `{}`. Available keys: {}",
                        part,
                        prefix,
                        available.join(", ")
                    )
                } else {
                    format!(
                        "Key `{}` not found. Did you mean {}? Available: {}",
                        part,
                        or_list(&matches, &prefix),
                        available.join(", ")
                    )
                });
            }
        }
    }

    None
}

pub fn suggest_unknown_filter(name: &str) -> String {
    let matches = find_closest_matches(name, AVAILABLE_FILTERS, 3);
    if matches.is_empty() {
        format!(
            "Unknown filter `{}`. Common filters: toyaml, tojson, b64encode, quote, default, nindent",
            name
        )
    } else {
        format!("Did you mean {}?", or_list(&matches, ""))
    }
}

pub fn suggest_unknown_function(name: &str) -> String {
    let matches = find_closest_matches(name, AVAILABLE_FUNCTIONS, 3);
    if matches.is_empty() {
        format!(
            "Unknown function `{}`. Available functions: {}",
            name,
            AVAILABLE_FUNCTIONS.join(", ")
        )
    } else {
        format!("Did you mean {}?", or_list(&matches, ""))
    }
}

pub fn suggest_iteration_fix(type_name: &str) -> String {
    match type_name {
        "map" | "object" => {
            "Maps are iterated with `| dictsort` or `| items`: `{% for k, v in m | dictsort %}`"
                .to_string()
        }
        "none" | "undefined" => {
            "Value is missing. Use `| default([])` to iterate over nothing".to_string()
        }
        other => format!("Value of type `{}` is not iterable", other),
    }
}

/// First backtick- or quote-delimited name in a message
pub fn extract_quoted_name(msg: &str) -> Option<String> {
    for delim in ['`', '\'', '"'] {
        if let Some(start) = msg.find(delim) {
            let rest = &msg[start + 1..];
            if let Some(end) = rest.find(delim) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}
