//! Template engine based on MiniJinja

use indexmap::IndexMap;
use minijinja::{Environment, UndefinedBehavior};
use std::collections::HashMap;

use helmix_core::project::{is_partial, output_name};
use helmix_core::{LoadedProject, Manifest, TemplateContext};

use crate::error::{EngineError, RenderReport, RenderResultWithReport, Result, TemplateError};
use crate::filters;
use crate::functions;

/// Template rendered as install notes rather than a manifest
const NOTES_TEMPLATE: &str = "NOTES.txt";

/// Whether a template renders notes, at any depth under `templates/`
fn is_notes(name: &str) -> bool {
    name.rsplit('/')
        .next()
        .is_some_and(|file| file.eq_ignore_ascii_case(NOTES_TEMPLATE))
}

/// Several notes templates are joined in render order
fn append_notes(notes: &mut Option<String>, text: String) {
    match notes {
        Some(existing) => {
            if !existing.ends_with('\n') {
                existing.push('\n');
            }
            existing.push_str(&text);
        }
        None => *notes = Some(text),
    }
}

/// The error raised where the problem is, past `include`/`import` wrappers
fn innermost(err: &minijinja::Error) -> &minijinja::Error {
    let mut current = err;
    while let Some(inner) = std::error::Error::source(current)
        .and_then(|e| e.downcast_ref::<minijinja::Error>())
        .filter(|e| e.name().is_some())
    {
        current = inner;
    }
    current
}

/// Directory name exposed as `template.basePath`
const TEMPLATES_BASE: &str = "templates";

/// Result of rendering a project
#[derive(Debug)]
pub struct RenderResult {
    /// Parsed manifests keyed by output name, in template path order
    pub manifests: IndexMap<String, Manifest>,

    /// Rendered `NOTES.txt`, if the project has one
    pub notes: Option<String>,
}

pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: true }
    }

    /// Fail on undefined variables (default), or render them as empty
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
pub struct Engine {
    strict_mode: bool,
}

/// What a successfully rendered template turned into
enum Rendered {
    Notes(String),
    Manifest(Manifest),
    Empty,
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        env.set_undefined_behavior(if self.strict_mode {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });
        // Manifests are YAML, not HTML
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("tojson_pretty", filters::tojson_pretty);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("empty", filters::empty);
        env.add_filter("haskey", filters::haskey);
        env.add_filter("keys", filters::keys);
        env.add_filter("merge", filters::merge);
        env.add_filter("sha256", filters::sha256);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);
        env.add_filter("snakecase", filters::snakecase);
        env.add_filter("kebabcase", filters::kebabcase);
        env.add_filter("tostrings", filters::tostrings);
        env.add_filter("semver_match", filters::semver_match);
        env.add_filter("int", filters::int);
        env.add_filter("float", filters::float);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("list", functions::list);
        env.add_function("get", functions::get);
        env.add_function("dig", functions::dig);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);
        env.add_function("tostring", functions::tostring);
        env.add_function("toint", functions::toint);
        env.add_function("tofloat", functions::tofloat);
        env.add_function("printf", functions::printf);

        env
    }

    fn context_value(context: &TemplateContext) -> minijinja::Value {
        minijinja::context! {
            values => &context.values,
            env => &context.env,
            project => &context.project,
            template => &context.template,
        }
    }

    /// Render a single template string
    pub fn render_string(
        &self,
        template: &str,
        context: &TemplateContext,
        template_name: &str,
    ) -> Result<String> {
        let mut env = self.create_environment();
        let to_error =
            |e: minijinja::Error| TemplateError::from_minijinja(&e, template_name, template, Some(&context.values));

        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(to_error)?;
        let tmpl = env.get_template(template_name).map_err(to_error)?;

        Ok(tmpl.render(Self::context_value(context)).map_err(to_error)?)
    }

    /// Read every template file, keyed by template name
    fn load_sources(project: &LoadedProject) -> Result<Vec<(String, String)>> {
        project
            .template_files()?
            .iter()
            .map(|file| -> Result<(String, String)> {
                Ok((project.template_name(file), std::fs::read_to_string(file)?))
            })
            .collect()
    }

    /// Templates whose output names collide, as one error per later template
    fn output_conflicts(sources: &[(String, String)]) -> Vec<(String, TemplateError)> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        let mut conflicts = Vec::new();

        for (name, _) in sources
            .iter()
            .filter(|(name, _)| !is_partial(name) && !is_notes(name))
        {
            let output = output_name(name);
            match seen.get(output) {
                Some(first) => conflicts.push((
                    name.clone(),
                    TemplateError::simple(format!(
                        "templates `{}` and `{}` both render to `{}`",
                        first, name, output
                    ))
                    .with_suggestion("Rename one of them so every output file has a single template"),
                )),
                None => {
                    seen.insert(output, name);
                }
            }
        }
        conflicts
    }

    /// Turn rendered text into notes, a parsed manifest, or nothing
    fn classify(name: &str, rendered: String) -> std::result::Result<Rendered, helmix_core::ManifestError> {
        if is_notes(name) {
            return Ok(Rendered::Notes(rendered));
        }

        let trimmed = rendered.trim();
        if trimmed.is_empty() || trimmed == "---" {
            return Ok(Rendered::Empty);
        }

        let manifest = Manifest::parse(output_name(name), &rendered)?;
        if manifest.is_empty() {
            return Ok(Rendered::Empty);
        }
        Ok(Rendered::Manifest(manifest))
    }

    /// Render every non-partial template, stopping at the first error
    ///
    /// Templates are processed in sorted path order. Partials (`_*`) are
    /// available to `include`/`import` but produce no output.
    pub fn render_project(
        &self,
        project: &LoadedProject,
        context: &TemplateContext,
    ) -> Result<RenderResult> {
        let sources = Self::load_sources(project)?;
        if let Some((_, conflict)) = Self::output_conflicts(&sources).into_iter().next() {
            return Err(conflict.into());
        }
        let lookup: HashMap<&str, &str> = sources
            .iter()
            .map(|(name, src)| (name.as_str(), src.as_str()))
            .collect();

        let to_error = |e: minijinja::Error, name: &str| {
            let e = innermost(&e);
            let origin = e.name().unwrap_or(name);
            let source = lookup.get(origin).copied().unwrap_or_default();
            EngineError::Template(TemplateError::from_minijinja(
                e,
                origin,
                source,
                Some(&context.values),
            ))
        };

        let mut env = self.create_environment();
        for (name, source) in &sources {
            env.add_template_owned(name.clone(), source.clone())
                .map_err(|e| to_error(e, name))?;
        }

        let mut manifests = IndexMap::new();
        let mut notes = None;

        for (name, _) in sources.iter().filter(|(name, _)| !is_partial(name)) {
            let tmpl = env.get_template(name).map_err(|e| to_error(e, name))?;
            let ctx = context.clone().with_template(name, TEMPLATES_BASE);
            let rendered = tmpl
                .render(Self::context_value(&ctx))
                .map_err(|e| to_error(e, name))?;

            match Self::classify(name, rendered)? {
                Rendered::Notes(text) => append_notes(&mut notes, text),
                Rendered::Manifest(manifest) => {
                    tracing::debug!(template = %name, documents = manifest.documents.len(), "rendered");
                    manifests.insert(manifest.name.clone(), manifest);
                }
                Rendered::Empty => tracing::debug!(template = %name, "rendered empty, skipping"),
            }
        }

        Ok(RenderResult { manifests, notes })
    }

    /// Render every template, collecting all errors instead of stopping
    ///
    /// Invalid YAML in a rendered template is reported like a template
    /// error, so one pass shows everything that is wrong.
    pub fn render_project_collect_errors(
        &self,
        project: &LoadedProject,
        context: &TemplateContext,
    ) -> RenderResultWithReport {
        let mut report = RenderReport::new();
        let mut manifests = IndexMap::new();
        let mut notes = None;

        let sources = match Self::load_sources(project) {
            Ok(sources) => sources,
            Err(e) => {
                report.add_error(
                    "<templates>",
                    TemplateError::simple(format!("Failed to read templates: {}", e)),
                );
                return RenderResultWithReport {
                    manifests,
                    notes,
                    report,
                };
            }
        };
        let lookup: HashMap<&str, &str> = sources
            .iter()
            .map(|(name, src)| (name.as_str(), src.as_str()))
            .collect();

        let to_error = |e: &minijinja::Error, name: &str| {
            let e = innermost(e);
            let origin = e.name().unwrap_or(name);
            let source = lookup.get(origin).copied().unwrap_or_default();
            TemplateError::from_minijinja(e, origin, source, Some(&context.values))
        };

        let conflicts = Self::output_conflicts(&sources);
        let conflicting: Vec<String> = conflicts.iter().map(|(name, _)| name.clone()).collect();
        for (name, conflict) in conflicts {
            report.add_error(name, conflict);
        }

        let mut env = self.create_environment();
        for (name, source) in &sources {
            // A template that fails to parse is reported once, here
            if let Err(e) = env.add_template_owned(name.clone(), source.clone()) {
                report.add_error(name.clone(), to_error(&e, name));
            }
        }

        for (name, _) in sources
            .iter()
            .filter(|(name, _)| !is_partial(name) && !conflicting.contains(name))
        {
            let Ok(tmpl) = env.get_template(name) else {
                continue;
            };
            let ctx = context.clone().with_template(name, TEMPLATES_BASE);

            let rendered = match tmpl.render(Self::context_value(&ctx)) {
                Ok(rendered) => rendered,
                Err(e) => {
                    report.add_error(name.clone(), to_error(&e, name));
                    continue;
                }
            };

            match Self::classify(name, rendered.clone()) {
                Ok(Rendered::Notes(text)) => append_notes(&mut notes, text),
                Ok(Rendered::Manifest(manifest)) => {
                    manifests.insert(manifest.name.clone(), manifest);
                }
                Ok(Rendered::Empty) => {}
                Err(e) => {
                    report.add_error(
                        name.clone(),
                        TemplateError::invalid_yaml(name, &rendered, e.to_string()),
                    );
                    continue;
                }
            }
            report.add_success(name.clone());
        }

        RenderResultWithReport {
            manifests,
            notes,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmix_core::{EnvInfo, Environment as ProjectEnvironment, Project, Values};
    use std::fs;

    fn context() -> TemplateContext {
        let values = Values::from_yaml(
            r#"
image:
  repository: nginx
  tag: "1.25"
replicas: 3
"#,
        )
        .unwrap();
        let project = Project::from_yaml("apiVersion: helmix/v1\nname: shop\nversion: 1.0.0").unwrap();
        let env = EnvInfo::new(
            "production",
            &ProjectEnvironment {
                namespace: Some("shop-prod".to_string()),
                ..Default::default()
            },
        );
        TemplateContext::new(values, env, &project)
    }

    #[test]
    fn test_render_string_snapshot() {
        let engine = Engine::new(true);
        let template = r#"metadata:
  name: {{ project.name }}
  labels:
    {{- {"tier": env.name, "version": project.version} | toyaml | nindent(4) }}
spec:
  replicas: {{ values.replicas }}
  image: {{ (values.image.repository ~ ":" ~ values.image.tag) | quote }}
"#;

        let out = engine.render_string(template, &context(), "inline.yaml").unwrap();
        insta::assert_snapshot!(out, @r#"
        metadata:
          name: shop
          labels:
            tier: production
            version: 1.0.0
        spec:
          replicas: 3
          image: "nginx:1.25"
        "#);
    }

    fn project(templates: &[(&str, &str)]) -> (tempfile::TempDir, LoadedProject) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("helmix.yaml"), "apiVersion: helmix/v1\nname: shop").unwrap();
        for (name, content) in templates {
            let path = dir.path().join("templates").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let loaded = LoadedProject::load(dir.path()).unwrap();
        (dir, loaded)
    }

    #[test]
    fn test_render_simple() {
        let engine = Engine::new(true);
        let result = engine
            .render_string("replicas: {{ values.replicas }}", &context(), "test.yaml")
            .unwrap();
        assert_eq!(result, "replicas: 3");
    }

    #[test]
    fn test_render_env_and_project() {
        let engine = Engine::new(true);
        let result = engine
            .render_string(
                "ns: {{ env.namespace }}\nenv: {{ env.name }}\napp: {{ project.name }}-{{ project.version }}",
                &context(),
                "test.yaml",
            )
            .unwrap();
        assert_eq!(result, "ns: shop-prod\nenv: production\napp: shop-1.0.0");
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = Engine::new(true);
        let result = engine
            .render_string(r#"cmd: {{ "a && b <c>" }}"#, &context(), "test.yaml")
            .unwrap();
        assert_eq!(result, "cmd: a && b <c>");
    }

    #[test]
    fn test_undefined_is_error_in_strict_mode() {
        let err = Engine::new(true)
            .render_string("value: {{ values.missing }}", &context(), "test.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("values.missing"), "{err}");
    }

    #[test]
    fn test_undefined_is_empty_in_lenient_mode() {
        let out = Engine::builder()
            .strict(false)
            .build()
            .render_string("value: '{{ values.missing }}'", &context(), "test.yaml")
            .unwrap();
        assert_eq!(out, "value: ''");
    }

    #[test]
    fn test_render_project_order_partials_and_notes() {
        let (_dir, project) = project(&[
            ("_helpers.tpl", "{% macro labels(name) %}app: {{ name }}{% endmacro %}"),
            (
                "service.yaml",
                "{% from \"_helpers.tpl\" import labels %}apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n  labels:\n    {{ labels(project.name) }}\n",
            ),
            (
                "deployment.yaml.j2",
                "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  annotations:\n    source: {{ template.name }}\nspec:\n  replicas: {{ values.replicas }}\n",
            ),
            ("optional.yaml", "{% if false %}kind: Never{% endif %}\n---\n"),
            ("NOTES.txt", "Deployed {{ project.name }} to {{ env.namespace }}"),
        ]);

        let result = Engine::new(true).render_project(&project, &context()).unwrap();

        let names: Vec<&String> = result.manifests.keys().collect();
        assert_eq!(names, vec!["deployment.yaml", "service.yaml"]);
        assert_eq!(result.notes.as_deref(), Some("Deployed shop to shop-prod"));

        let deploy = &result.manifests["deployment.yaml"];
        assert_eq!(deploy.documents[0]["spec"]["replicas"], 3);
        assert_eq!(
            deploy.documents[0]["metadata"]["annotations"]["source"],
            "deployment.yaml.j2"
        );
        assert_eq!(
            result.manifests["service.yaml"].documents[0]["metadata"]["labels"]["app"],
            "shop"
        );
    }

    #[test]
    fn test_render_project_is_deterministic() {
        let (_dir, project) = project(&[(
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\ndata:\n  image: {{ values.image | tojson | quote }}\n  sum: {{ values | tojson | sha256 }}\n",
        )]);
        let engine = Engine::new(true);

        let first = engine.render_project(&project, &context()).unwrap();
        let second = engine.render_project(&project, &context()).unwrap();

        assert_eq!(
            first.manifests["cm.yaml"].content,
            second.manifests["cm.yaml"].content
        );
    }

    #[test]
    fn test_render_project_rejects_invalid_yaml() {
        let (_dir, project) = project(&[("bad.yaml", "key: [unclosed {{ values.replicas }}\n")]);

        let err = Engine::new(true).render_project(&project, &context()).unwrap_err();
        assert!(matches!(err, EngineError::Manifest(_)));
    }

    #[test]
    fn test_render_project_error_in_partial_points_at_partial() {
        let (_dir, project) = project(&[
            ("_name.tpl", "{{ values.nme }}"),
            ("svc.yaml", "name: {% include \"_name.tpl\" %}\n"),
        ]);

        let err = Engine::new(true).render_project(&project, &context()).unwrap_err();
        match err {
            EngineError::Template(e) => {
                assert_eq!(e.src.name(), "_name.tpl");
                assert_eq!(e.kind(), crate::TemplateErrorKind::UndefinedVariable);
                assert_eq!(e.message, "undefined variable `values.nme`");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_collect_errors_in_partial_points_at_partial() {
        let (_dir, project) = project(&[
            ("_name.tpl", "{{ values.nme }}"),
            ("svc.yaml", "name: {% include \"_name.tpl\" %}\n"),
        ]);

        let result = Engine::new(true).render_project_collect_errors(&project, &context());

        let errors = &result.report.errors_by_template["svc.yaml"];
        assert_eq!(errors[0].src.name(), "_name.tpl");
        assert!(errors[0].suggestion.as_deref().unwrap_or_default().contains("values.image"));
    }

    #[test]
    fn test_colliding_output_names_are_rejected() {
        let (_dir, project) = project(&[
            ("cm.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n"),
            ("cm.yaml.j2", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\n"),
        ]);
        let engine = Engine::new(true);

        let err = engine.render_project(&project, &context()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "templates `cm.yaml` and `cm.yaml.j2` both render to `cm.yaml`"
        );

        let result = engine.render_project_collect_errors(&project, &context());
        assert_eq!(result.report.total_errors, 1);
        assert!(result.report.errors_by_template.contains_key("cm.yaml.j2"));
        assert_eq!(result.manifests["cm.yaml"].documents[0]["metadata"]["name"], "a");
    }

    #[test]
    fn test_nested_notes_are_notes() {
        let (_dir, project) = project(&[
            ("NOTES.txt", "Deployed {{ project.name }}"),
            ("db/NOTES.txt", "Database: {{ env.namespace }}"),
            ("db/cm.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: db\n"),
        ]);

        let result = Engine::new(true).render_project(&project, &context()).unwrap();

        let names: Vec<&String> = result.manifests.keys().collect();
        assert_eq!(names, vec!["db/cm.yaml"]);
        assert_eq!(
            result.notes.as_deref(),
            Some("Deployed shop\nDatabase: shop-prod")
        );
    }

    #[test]
    fn test_collect_errors_reports_every_template() {
        let (_dir, project) = project(&[
            ("a.yaml", "a: {{ values.nope }}\n"),
            ("b.yaml", "b: {{ values.replicas | toyml }}\n"),
            ("c.yaml", "c: [\n"),
            ("d.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ok\n"),
            ("e.yaml", "e: {{ values.replicas \n"),
        ]);

        let result = Engine::new(true).render_project_collect_errors(&project, &context());

        assert!(!result.is_success());
        assert_eq!(result.report.total_errors, 4);
        assert_eq!(result.report.successful_templates, vec!["d.yaml"]);
        assert!(result.manifests.contains_key("d.yaml"));
        assert_eq!(
            result.report.errors_by_template["c.yaml"][0].kind(),
            crate::TemplateErrorKind::YamlParseError
        );
    }
}
