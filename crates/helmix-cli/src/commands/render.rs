//! Render command - render an environment's manifests

use console::style;
use helmix_engine::RenderResult;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pipeline::{self, ValuesArgs};

/// Flags controlling what `render` emits
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Write files here instead of stdout
    pub output_dir: Option<PathBuf>,
    /// Ignore `output.dir` from helmix.yaml and print to stdout
    pub stdout: bool,
    /// Only emit manifests whose name contains this string
    pub show_only: Option<String>,
    /// Re-serialize documents instead of emitting the rendered text
    pub normalize: bool,
    /// Render undefined variables as empty
    pub lenient: bool,
    pub skip_schema: bool,
}

/// Rendered manifests as output file name to file content
///
/// Built completely in memory, so a failure leaves nothing half-written.
pub fn output_files(
    result: &RenderResult,
    show_only: Option<&str>,
    normalize: bool,
) -> Result<IndexMap<String, String>> {
    let mut files = IndexMap::new();

    for (name, manifest) in &result.manifests {
        if show_only.is_some_and(|filter| !name.contains(filter)) {
            continue;
        }

        let content = if normalize {
            manifest.normalized()?
        } else {
            let mut text = manifest.content.trim().to_string();
            text.push('\n');
            text
        };
        files.insert(name.clone(), content);
    }

    Ok(files)
}

/// Join manifests into a single stream with `# Source:` headers
pub fn to_stream(files: &IndexMap<String, String>) -> String {
    let mut out = String::new();
    for (name, content) in files {
        out.push_str("---\n");
        out.push_str(&format!("# Source: {}\n", name));
        out.push_str(content.trim_start_matches("---\n"));
    }
    out
}

pub fn run(path: &Path, env: &str, values: &ValuesArgs, options: &RenderOptions, quiet: bool) -> Result<()> {
    let prepared = pipeline::prepare(path, env, values, options.skip_schema)?;
    let result = pipeline::render(&prepared, options.lenient)?;
    let files = output_files(&result, options.show_only.as_deref(), options.normalize)?;

    let output_dir = if options.stdout {
        None
    } else {
        options.output_dir.clone().or_else(|| {
            prepared
                .project
                .project
                .output
                .dir
                .as_deref()
                .map(|dir| prepared.project.resolve(dir))
        })
    };

    let Some(output_dir) = output_dir else {
        print!("{}", to_stream(&files));
        if let Some(notes) = result.notes.as_deref().filter(|_| !quiet) {
            eprintln!();
            eprintln!("{}", style("NOTES:").yellow().bold());
            eprintln!("{}", notes.trim_end());
        }
        return Ok(());
    };

    fs::create_dir_all(&output_dir)?;

    for (name, content) in &files {
        let file_path = output_dir.join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, content)?;

        if !quiet {
            eprintln!("{} {}", style("wrote").green(), file_path.display());
        }
    }

    if let Some(notes) = &result.notes {
        let notes_path = output_dir.join("NOTES.txt");
        fs::write(&notes_path, notes)?;
        if !quiet {
            eprintln!("{} {}", style("wrote").green(), notes_path.display());
        }
    }

    tracing::debug!(files = files.len(), dir = %output_dir.display(), "wrote manifests");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmix_core::Manifest;

    fn result() -> RenderResult {
        let mut manifests = IndexMap::new();
        for (name, content) in [
            ("configmap.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n\n"),
            ("deployment.yaml", "---\napiVersion: apps/v1\nkind:   Deployment\nmetadata:\n  name: web\n"),
        ] {
            manifests.insert(name.to_string(), Manifest::parse(name, content).unwrap());
        }
        RenderResult {
            manifests,
            notes: None,
        }
    }

    #[test]
    fn test_stream_has_source_headers() {
        let files = output_files(&result(), None, false).unwrap();
        insta::assert_snapshot!(to_stream(&files), @r"
        ---
        # Source: configmap.yaml
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: cfg
        ---
        # Source: deployment.yaml
        apiVersion: apps/v1
        kind:   Deployment
        metadata:
          name: web
        ");
    }

    #[test]
    fn test_show_only_and_normalize() {
        let files = output_files(&result(), Some("deploy"), true).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(
            files["deployment.yaml"],
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n"
        );
    }
}
