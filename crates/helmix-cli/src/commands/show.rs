//! Show command - display project information

use console::style;
use std::path::Path;

use crate::error::Result;
use crate::pipeline;

pub fn run(path: &Path) -> Result<()> {
    let loaded = pipeline::load_project(path)?;
    let project = &loaded.project;

    println!("{}", style(&project.name).cyan().bold());
    println!("{}", style("=".repeat(project.name.len())).dim());
    println!();

    if let Some(version) = &project.version {
        println!("{}: {}", style("Version").bold(), version);
    }
    if let Some(desc) = &project.description {
        println!("{}: {}", style("Description").bold(), desc);
    }
    println!(
        "{}: {}",
        style("Undefined values").bold(),
        if project.engine.strict { "error (strict)" } else { "empty (lenient)" }
    );
    if let Some(schema) = &loaded.schema_path {
        println!("{}: {}", style("Schema").bold(), schema.display());
    }
    if let Some(dir) = &project.output.dir {
        println!("{}: {}", style("Output").bold(), dir.display());
    }

    println!();
    println!("{}:", style("Environments").bold());
    if project.environments.is_empty() {
        println!("  (none declared; any name uses values.yaml and values/<env>.yaml)");
    }
    for (name, env) in &project.environments {
        println!(
            "  - {} (namespace {})",
            style(name).cyan(),
            env.namespace.as_deref().unwrap_or(name)
        );
        if let Some(desc) = &env.description {
            println!("      {}", style(desc).dim());
        }
        if let Some(files) = &env.values {
            for file in files {
                println!("      {}", file.display());
            }
        }
    }

    let gpg = &project.gpg;
    if gpg.require_signatures || !gpg.trusted_keys.is_empty() || gpg.homedir.is_some() {
        println!();
        println!("{}:", style("GPG").bold());
        println!(
            "  signatures: {}",
            if gpg.require_signatures { "required" } else { "optional" }
        );
        for key in &gpg.trusted_keys {
            println!("  trusted: {}", key);
        }
        if let Some(homedir) = &gpg.homedir {
            println!("  homedir: {}", homedir.display());
        }
    }

    println!();
    println!("{}:", style("Templates").bold());
    for template in loaded.template_files()? {
        let name = loaded.template_name(&template);
        if helmix_core::project::is_partial(&name) {
            println!("  - {} {}", name, style("(partial)").dim());
        } else {
            println!("  - {}", name);
        }
    }

    Ok(())
}
