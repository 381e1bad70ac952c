//! Validate command - validate merged values against the schema

use console::style;
use helmix_core::Values;
use std::path::Path;

use crate::display::ValidationReport;
use crate::error::{CliError, Result};
use crate::pipeline::{self, ValuesArgs};

pub fn run(
    path: &Path,
    env: &str,
    values: &ValuesArgs,
    external_schema: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    let project = pipeline::load_project(path)?;

    let (validator, schema_name) = match external_schema {
        Some(schema_path) => (
            Some(pipeline::external_schema(schema_path)?),
            schema_path.display().to_string(),
        ),
        None => (
            pipeline::schema_validator(&project)?,
            pipeline::schema_name(&project),
        ),
    };

    let Some(validator) = validator else {
        if json_output {
            let output = serde_json::json!({
                "valid": true,
                "schema": null,
                "errors": [],
            });
            println!("{}", output);
        } else {
            println!(
                "{} No schema found (values.schema.yaml or values.schema.json)",
                style("⚠").yellow()
            );
        }
        return Ok(());
    };

    if !json_output {
        println!(
            "{} Validating {} values for {} against {}",
            style("→").blue(),
            style(env).cyan().bold(),
            project.project.name,
            schema_name
        );
    }

    let loaded = pipeline::load_values(&project, env, values)?;
    let merged = Values::with_schema_defaults(validator.defaults_as_values(), loaded.values);
    let result = validator.validate(merged.inner());

    if json_output {
        let output = serde_json::json!({
            "valid": result.is_valid,
            "project": project.project.name,
            "environment": env,
            "schema": schema_name,
            "errors": result.errors,
        });
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::other(format!("Failed to serialize result: {}", e)))?;
        println!("{}", text);
    } else if result.is_valid {
        println!("{} Validation passed!", style("✓").green().bold());
    } else {
        let mut report = ValidationReport::new();
        for error in &result.errors {
            report.add_error(&schema_name, &error.path, &error.message);
        }
        report.display();
        println!();
    }

    if result.is_valid {
        Ok(())
    } else {
        Err(CliError::validation_with_help(
            format!("{} value(s) do not match {}", result.errors.len(), schema_name),
            "Fix the values files, or pass --skip-schema to render anyway",
        ))
    }
}
