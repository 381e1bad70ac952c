//! Engine errors rendered as miette diagnostics

use indexmap::IndexMap;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use helmix_core::{CoreError, ManifestError};

use crate::suggestions::{
    extract_quoted_name, suggest_iteration_fix, suggest_undefined, suggest_unknown_filter,
    suggest_unknown_function,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Project(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    MissingTemplate,
    YamlParseError,
    Other,
}

impl TemplateErrorKind {
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFilter => "unknown_filter",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::MissingTemplate => "missing_template",
            Self::YamlParseError => "yaml_parse",
            Self::Other => "render",
        }
    }
}

/// A template failure pointing at the offending source line
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(helmix::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Translate a MiniJinja error
    ///
    /// `source` must be the text of the template the error points into
    /// (which for an include may differ from the template being rendered).
    /// `values` feeds the "did you mean" hints for missing keys.
    pub fn from_minijinja(
        err: &minijinja::Error,
        template_name: &str,
        source: &str,
        values: Option<&serde_json::Value>,
    ) -> Self {
        let kind = categorize(err);
        let span = locate(err, source);
        let snippet = span.and_then(|s| source.get(s.offset()..s.offset() + s.len()));
        let detail = err.detail().unwrap_or_default();

        let (message, suggestion) = match kind {
            TemplateErrorKind::UndefinedVariable => {
                // The span may cover only the missing tail (`.image.repo`)
                let expr = span
                    .filter(|s| err.range().is_some_and(|r| r.start == s.offset()))
                    .and_then(|s| expression_at(source, s))
                    .or_else(|| snippet.and_then(expression_in))
                    .or_else(|| err.line().and_then(|l| line_expression(source, l)));
                match expr {
                    Some(expr) => (
                        format!("undefined variable `{}`", expr),
                        Some(suggest_undefined(&expr, values)),
                    ),
                    None => (
                        "undefined variable".to_string(),
                        Some("Check the spelling or use `| default(...)`.".to_string()),
                    ),
                }
            }
            TemplateErrorKind::UnknownFilter => {
                let name = snippet
                    .and_then(filter_in)
                    .or_else(|| word_after(detail, "filter"))
                    .or_else(|| extract_quoted_name(detail));
                match name {
                    Some(name) => (
                        format!("unknown filter `{}`", name),
                        Some(suggest_unknown_filter(&name)),
                    ),
                    None => ("unknown filter".to_string(), None),
                }
            }
            TemplateErrorKind::UnknownFunction => {
                let name = snippet
                    .and_then(|s| s.split('(').next())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && !s.contains(char::is_whitespace))
                    .or_else(|| detail.split_whitespace().next().map(str::to_string));
                match name {
                    Some(name) => (
                        format!("unknown function `{}`", name),
                        Some(suggest_unknown_function(&name)),
                    ),
                    None => ("unknown function".to_string(), None),
                }
            }
            TemplateErrorKind::SyntaxError => (
                format!("syntax error: {}", non_empty(detail, err)),
                Some(
                    "Check delimiters: `{{ }}` for expressions, `{% %}` for statements, `{# #}` for comments"
                        .to_string(),
                ),
            ),
            TemplateErrorKind::TypeError => {
                let message = non_empty(detail, err);
                let hint = if message.contains("not iterable") {
                    Some(suggest_iteration_fix(
                        message.split_whitespace().next().unwrap_or("value"),
                    ))
                } else {
                    None
                };
                (message, hint)
            }
            TemplateErrorKind::MissingTemplate => (
                non_empty(detail, err),
                Some("Includes are resolved relative to `templates/`".to_string()),
            ),
            _ => (non_empty(detail, err), None),
        };

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, source.to_string()),
            span,
            suggestion,
        }
    }

    /// An error with no source location
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    /// Rendered output that is not valid YAML
    pub fn invalid_yaml(template_name: &str, rendered: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::YamlParseError,
            src: NamedSource::new(format!("{} (rendered)", template_name), rendered.to_string()),
            span: None,
            suggestion: Some(
                "Pipe structured values through `toyaml | nindent(n)` and quote strings with `quote`"
                    .to_string(),
            ),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    use minijinja::ErrorKind;

    match err.kind() {
        ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        ErrorKind::TemplateNotFound => TemplateErrorKind::MissingTemplate,
        ErrorKind::NonPrimitive | ErrorKind::NonKey => TemplateErrorKind::TypeError,
        ErrorKind::InvalidOperation => {
            let detail = err.detail().unwrap_or_default();
            if detail.contains("not iterable") || detail.contains("cannot") {
                TemplateErrorKind::TypeError
            } else {
                TemplateErrorKind::InvalidOperation
            }
        }
        _ => TemplateErrorKind::Other,
    }
}

fn non_empty(detail: &str, err: &minijinja::Error) -> String {
    if detail.is_empty() {
        err.kind().to_string()
    } else {
        detail.to_string()
    }
}

/// Byte span of the error, preferring MiniJinja's exact range
fn locate(err: &minijinja::Error, source: &str) -> Option<SourceSpan> {
    if let Some(range) = err.range() {
        if range.end <= source.len() && range.start < range.end {
            return Some(SourceSpan::new(range.start.into(), range.end - range.start));
        }
    }
    err.line().and_then(|line| line_span(source, line))
}

fn line_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (idx, line) in source.split('\n').enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }
    None
}

/// `values.image.tag | quote` → `values.image.tag`
fn expression_in(snippet: &str) -> Option<String> {
    let expr = snippet
        .trim_start_matches("{{")
        .trim_end_matches("}}")
        .split('|')
        .next()?
        .trim();
    let valid = !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    valid.then(|| expr.to_string())
}

/// The whole dotted path a span points into, e.g. `values.image.repo`
/// for a span over `.repo`
fn expression_at(source: &str, span: SourceSpan) -> Option<String> {
    let is_path = |c: char| c.is_alphanumeric() || c == '_' || c == '.';
    let snippet = source.get(span.offset()..span.offset() + span.len())?;
    let start = span.offset() + snippet.find(is_path)?;

    let from = source
        .get(..start)?
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_path(*c))
        .last()
        .map_or(start, |(i, _)| i);
    let rest = source.get(from..)?;
    let end = rest.find(|c: char| !is_path(c)).unwrap_or(rest.len());

    let expr = rest[..end].trim_matches('.');
    let valid = !expr.is_empty() && !expr.starts_with(|c: char| c.is_ascii_digit());
    valid.then(|| expr.to_string())
}

/// Expression of the first `{{ ... }}` on a source line
fn line_expression(source: &str, line_num: usize) -> Option<String> {
    let line = source.lines().nth(line_num.checked_sub(1)?)?;
    let start = line.find("{{")?;
    let end = line[start..].find("}}")? + start;
    expression_in(&line[start + 2..end])
}

/// `values.name | toyml(2)` → `toyml`
fn filter_in(snippet: &str) -> Option<String> {
    let after_pipe = snippet.rsplit('|').next()?;
    let name: String = after_pipe
        .trim()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

fn word_after(text: &str, keyword: &str) -> Option<String> {
    let mut words = text.split_whitespace();
    words.find(|w| *w == keyword)?;
    words
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
        .filter(|w| !w.is_empty())
}

/// Every template error from one render pass, grouped by template
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Insertion-ordered, i.e. in render order
    pub errors_by_template: IndexMap<String, Vec<TemplateError>>,

    pub successful_templates: Vec<String>,

    pub total_errors: usize,
}

impl RenderReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, template_name: impl Into<String>, error: TemplateError) {
        self.errors_by_template
            .entry(template_name.into())
            .or_default()
            .push(error);
        self.total_errors += 1;
    }

    pub fn add_success(&mut self, template_name: impl Into<String>) {
        self.successful_templates.push(template_name.into());
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn templates_with_errors(&self) -> usize {
        self.errors_by_template.len()
    }

    /// e.g. "3 errors in 2 templates"
    pub fn summary(&self) -> String {
        let plural = |n: usize, word: &str| {
            if n == 1 {
                format!("{} {}", n, word)
            } else {
                format!("{} {}s", n, word)
            }
        };
        format!(
            "{} in {}",
            plural(self.total_errors, "error"),
            plural(self.templates_with_errors(), "template")
        )
    }
}

/// Output of [`crate::Engine::render_project_collect_errors`]
#[derive(Debug)]
pub struct RenderResultWithReport {
    /// Manifests that rendered cleanly, keyed by output name
    pub manifests: IndexMap<String, helmix_core::Manifest>,

    pub notes: Option<String>,

    pub report: RenderReport,
}

impl RenderResultWithReport {
    pub fn is_success(&self) -> bool {
        !self.report.has_errors()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::{Environment, UndefinedBehavior, context};

    fn render_err(source: &str) -> TemplateError {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        let values = serde_json::json!({"image": {"repository": "nginx", "tag": "1.25"}});
        let err = env
            .render_named_str("deploy.yaml", source, context! { values => &values })
            .unwrap_err();
        TemplateError::from_minijinja(&err, "deploy.yaml", source, Some(&values))
    }

    #[test]
    fn test_report_summary() {
        let mut report = RenderReport::new();
        assert!(!report.has_errors());

        report.add_error("a.yaml", TemplateError::simple("one"));
        assert_eq!(report.summary(), "1 error in 1 template");

        report.add_error("a.yaml", TemplateError::simple("two"));
        report.add_error("b.yaml", TemplateError::simple("three"));
        assert_eq!(report.summary(), "3 errors in 2 templates");
        assert_eq!(report.errors_by_template["a.yaml"].len(), 2);
    }

    #[test]
    fn test_report_keeps_render_order() {
        let mut report = RenderReport::new();
        report.add_error("z.yaml", TemplateError::simple("late"));
        report.add_error("a.yaml", TemplateError::simple("early"));
        let names: Vec<&String> = report.errors_by_template.keys().collect();
        assert_eq!(names, vec!["z.yaml", "a.yaml"]);
    }

    #[test]
    fn test_undefined_values_key() {
        let err = render_err("image: {{ values.image.tga }}");
        assert_eq!(err.kind(), TemplateErrorKind::UndefinedVariable);
        assert_eq!(err.message, "undefined variable `values.image.tga`");
        assert!(err.suggestion.unwrap().contains("values.image.tag"));
        assert!(err.span.is_some());
    }

    #[test]
    fn test_missing_nested_key_keeps_full_path() {
        let err = render_err("repo: {{ values.image.repo }}");
        assert_eq!(err.message, "undefined variable `values.image.repo`");
        assert!(err.suggestion.unwrap().contains("repository"));
    }

    #[test]
    fn test_expression_at_widens_to_dotted_path() {
        let source = "a: {{ x }}\nrepo: {{ values.image.repo | quote }}";
        let offset = source.find(".repo").unwrap();
        assert_eq!(
            expression_at(source, SourceSpan::new(offset.into(), 5)),
            Some("values.image.repo".to_string())
        );
        let offset = source.find("{{ values").unwrap();
        assert_eq!(
            expression_at(source, SourceSpan::new(offset.into(), 20)),
            Some("values.image.repo".to_string())
        );
    }

    #[test]
    fn test_helm_habit_is_corrected() {
        let err = render_err("image: {{ Values.image.tag }}");
        assert_eq!(err.kind(), TemplateErrorKind::UndefinedVariable);
        assert!(err.suggestion.unwrap().starts_with("Did you mean `values.image"));
    }

    #[test]
    fn test_unknown_filter() {
        let err = render_err("image: {{ values.image.tag | toyml }}");
        assert_eq!(err.kind(), TemplateErrorKind::UnknownFilter);
        assert!(err.message.contains("toyml"), "{}", err.message);
    }

    #[test]
    fn test_syntax_error() {
        let err = render_err("image: {{ values.image.tag }");
        assert_eq!(err.kind(), TemplateErrorKind::SyntaxError);
        assert!(err.message.starts_with("syntax error"));
    }

    #[test]
    fn test_expression_helpers() {
        assert_eq!(expression_in("values.a.b | quote"), Some("values.a.b".to_string()));
        assert_eq!(expression_in("x + 1"), None);
        assert_eq!(filter_in("values.name | toyml(2)"), Some("toyml".to_string()));
        assert_eq!(
            line_expression("a: 1\nb: {{ values.b }}\n", 2),
            Some("values.b".to_string())
        );
        assert_eq!(word_after("filter toyml is unknown", "filter"), Some("toyml".to_string()));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(
            TemplateErrorKind::UndefinedVariable.to_code_string(),
            "undefined_variable"
        );
        assert_eq!(TemplateErrorKind::YamlParseError.to_code_string(), "yaml_parse");
    }
}
