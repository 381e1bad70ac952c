//! Values command - print the merged values for an environment

use console::style;
use helmix_core::{Envelope, NoKeyring, SignaturePolicy, ValuesLoader};
use std::path::Path;

use crate::display::display_sources;
use crate::error::{CliError, Result};
use crate::pipeline::{self, ValuesArgs};

pub fn run(
    path: &Path,
    env: &str,
    values: &ValuesArgs,
    json: bool,
    sources_only: bool,
    skip_schema: bool,
) -> Result<()> {
    if sources_only {
        return show_sources(path, env, values);
    }

    let project = pipeline::load_project(path)?;
    let mut loaded = pipeline::load_values(&project, env, values)?;
    if !skip_schema {
        loaded.values = pipeline::apply_schema(&project, loaded.values)?;
    }

    if json {
        let text = serde_json::to_string_pretty(loaded.values.inner())
            .map_err(|e| CliError::other(format!("Failed to serialize values: {}", e)))?;
        println!("{}", text);
    } else {
        print!("{}", loaded.values.to_yaml()?);
    }

    Ok(())
}

/// List the resolved sources in merge order without reading them
fn show_sources(path: &Path, env: &str, values: &ValuesArgs) -> Result<()> {
    let project = pipeline::load_project(path)?;

    // Resolution only looks at paths; nothing is opened
    let envelope = Envelope::new(&NoKeyring, SignaturePolicy::default());
    let sources = ValuesLoader::new(&project, envelope).resolve_sources(env, &values.values)?;

    println!(
        "{} values sources for {} (last wins):",
        style("→").blue(),
        style(env).cyan().bold()
    );
    display_sources(&sources);

    if !values.set.is_empty() {
        println!("  +  {} --set override(s)", values.set.len());
    }

    Ok(())
}
