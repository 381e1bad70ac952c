//! Lint command - check a project end to end

use console::style;
use helmix_core::{EnvInfo, LoadedProject, TemplateContext, Values};
use std::path::Path;

use crate::display::{ValidationReport, display_render_report, pluralize};
use crate::error::{CliError, Result};
use crate::pipeline::{self, ValuesArgs};

/// Environment name used when a project declares none
const DEFAULT_ENVIRONMENT: &str = "default";

pub fn run(path: &Path, env: Option<&str>, values: &ValuesArgs, strict: bool) -> Result<()> {
    println!("{} Linting project at {}", style("→").blue(), path.display());

    let mut errors = 0;
    let mut warnings = 0;

    let project = match pipeline::load_project(path) {
        Ok(p) => {
            println!(
                "  {} helmix.yaml is valid ({}{})",
                style("✓").green(),
                p.project.name,
                p.project
                    .version
                    .as_ref()
                    .map(|v| format!(" v{}", v))
                    .unwrap_or_default()
            );
            p
        }
        Err(e) => {
            println!("  {} helmix.yaml: {}", style("✗").red(), e);
            return finish(1, 0);
        }
    };

    match project.template_files() {
        Ok(files) if files.is_empty() => {
            println!("  {} no templates found in templates/", style("⚠").yellow());
            warnings += 1;
        }
        Ok(files) => println!(
            "  {} templates/ contains {}",
            style("✓").green(),
            pluralize(files.len(), "template", "templates")
        ),
        Err(e) => {
            println!("  {} templates/: {}", style("✗").red(), e);
            errors += 1;
        }
    }

    let validator = match pipeline::schema_validator(&project) {
        Ok(Some(v)) => {
            println!(
                "  {} {} compiles",
                style("✓").green(),
                pipeline::schema_name(&project)
            );
            Some(v)
        }
        Ok(None) => None,
        Err(e) => {
            println!("  {} {}", style("✗").red(), e);
            errors += 1;
            None
        }
    };

    let environments: Vec<String> = match env {
        Some(name) => vec![name.to_string()],
        None if project.project.environments.is_empty() => vec![DEFAULT_ENVIRONMENT.to_string()],
        None => project.project.environments.keys().cloned().collect(),
    };

    for env_name in &environments {
        println!();
        println!(
            "{} Environment {}",
            style("→").blue(),
            style(env_name).cyan().bold()
        );

        let loaded = match pipeline::load_values(&project, env_name, values) {
            Ok(loaded) => {
                println!(
                    "  {} values loaded from {}",
                    style("✓").green(),
                    pluralize(loaded.sources.len(), "file", "files")
                );
                loaded
            }
            Err(e) => {
                println!("  {} {}", style("✗").red(), e);
                errors += 1;
                continue;
            }
        };

        let mut values = loaded.values;
        if let Some(validator) = &validator {
            values = Values::with_schema_defaults(validator.defaults_as_values(), values);
            let result = validator.validate(values.inner());
            if result.is_valid {
                println!("  {} values match the schema", style("✓").green());
            } else {
                let mut report = ValidationReport::new();
                for error in &result.errors {
                    report.add_error(&pipeline::schema_name(&project), &error.path, &error.message);
                }
                report.display();
                errors += report.summary().0;
            }
        }

        let (env_errors, env_warnings) = lint_render(&project, env_name, values, strict)?;
        errors += env_errors;
        warnings += env_warnings;
    }

    println!();
    finish(errors, warnings)
}

/// Render every template for one environment and check the output
fn lint_render(
    project: &LoadedProject,
    env_name: &str,
    values: Values,
    strict: bool,
) -> Result<(usize, usize)> {
    let environment = project.project.environment(env_name)?;
    let context = TemplateContext::new(values, EnvInfo::new(env_name, &environment), &project.project);

    let engine = helmix_engine::Engine::builder()
        .strict(strict || project.project.engine.strict)
        .build();
    let result = engine.render_project_collect_errors(project, &context);

    let mut errors = 0;
    if result.is_success() {
        println!(
            "  {} rendered {}",
            style("✓").green(),
            pluralize(result.manifests.len(), "manifest", "manifests")
        );
    } else {
        display_render_report(&result.report);
        errors += result.report.total_errors;
    }

    // Shape problems fail the lint only in strict mode
    let mut report = ValidationReport::new();
    for manifest in result.manifests.values() {
        for issue in manifest.check_kubernetes() {
            let location = format!("document {}", issue.document + 1);
            if strict {
                report.add_error(&issue.template, &location, &issue.message);
            } else {
                report.add_warning(&issue.template, &location, &issue.message);
            }
        }
    }

    if report.issues.is_empty() {
        if !result.manifests.is_empty() {
            println!("  {} manifests look like Kubernetes objects", style("✓").green());
        }
    } else {
        report.display();
    }

    let (shape_errors, shape_warnings) = report.summary();
    Ok((errors + shape_errors, shape_warnings))
}

fn finish(errors: usize, warnings: usize) -> Result<()> {
    if errors > 0 {
        println!(
            "{} Linting failed with {} and {}",
            style("✗").red().bold(),
            pluralize(errors, "error", "errors"),
            pluralize(warnings, "warning", "warnings")
        );
        Err(CliError::lint_failed(errors, warnings))
    } else if warnings > 0 {
        println!(
            "{} Linting passed with {}",
            style("⚠").yellow().bold(),
            pluralize(warnings, "warning", "warnings")
        );
        Ok(())
    } else {
        println!("{} Linting passed!", style("✓").green().bold());
        Ok(())
    }
}
