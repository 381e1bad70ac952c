//! Diff command - compare a fresh render with a previously rendered directory

use console::style;
use indexmap::IndexMap;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::Path;

use crate::commands::render::{self, RenderOptions};
use crate::error::Result;
use crate::pipeline::{self, ValuesArgs};

/// Lines of context around each change
const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

/// One file that differs between the render and the directory
#[derive(Debug, Clone)]
pub struct FileChange {
    pub name: String,
    pub change_type: ChangeType,
    pub old: String,
    pub new: String,
}

/// Compare rendered files with what is already on disk
///
/// Only `.yaml`/`.yml` files on disk are considered, so `NOTES.txt` and
/// unrelated files in the directory are ignored.
pub fn compare(rendered: &IndexMap<String, String>, dir: &Path) -> Result<Vec<FileChange>> {
    let mut changes = Vec::new();

    for (name, new) in rendered {
        let path = dir.join(name);
        if !path.is_file() {
            changes.push(FileChange {
                name: name.clone(),
                change_type: ChangeType::Added,
                old: String::new(),
                new: new.clone(),
            });
            continue;
        }

        let old = fs::read_to_string(&path)?;
        if old != *new {
            changes.push(FileChange {
                name: name.clone(),
                change_type: ChangeType::Modified,
                old,
                new: new.clone(),
            });
        }
    }

    if dir.is_dir() {
        let mut on_disk = Vec::new();
        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let path = entry.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml")
            );
            if !entry.file_type().is_file() || !is_yaml {
                continue;
            }
            let Ok(rel) = path.strip_prefix(dir) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !rendered.contains_key(&name) {
                on_disk.push((name, fs::read_to_string(path)?));
            }
        }

        changes.extend(on_disk.into_iter().map(|(name, old)| FileChange {
            name,
            change_type: ChangeType::Removed,
            old,
            new: String::new(),
        }));
    }

    Ok(changes)
}

/// e.g. "1 added, 2 modified"
pub fn summary(changes: &[FileChange]) -> String {
    let count = |t: ChangeType| changes.iter().filter(|c| c.change_type == t).count();

    let parts: Vec<String> = [
        (ChangeType::Added, "added"),
        (ChangeType::Modified, "modified"),
        (ChangeType::Removed, "removed"),
    ]
    .into_iter()
    .map(|(t, label)| (count(t), label))
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{} {}", n, label))
    .collect();

    if parts.is_empty() {
        "No changes".to_string()
    } else {
        parts.join(", ")
    }
}

fn print_change(change: &FileChange) {
    let diff = TextDiff::from_lines(&change.old, &change.new);

    println!("{}", style(format!("--- a/{}", change.name)).bold());
    println!("{}", style(format!("+++ b/{}", change.name)).bold());

    for group in diff.grouped_ops(CONTEXT_LINES) {
        if let (Some(first), Some(last)) = (group.first(), group.last()) {
            let old = first.old_range().start..last.old_range().end;
            let new = first.new_range().start..last.new_range().end;
            println!(
                "{}",
                style(format!(
                    "@@ -{},{} +{},{} @@",
                    old.start + 1,
                    old.len(),
                    new.start + 1,
                    new.len()
                ))
                .cyan()
            );
        }

        for op in &group {
            for change in diff.iter_changes(op) {
                let line = change.value().trim_end_matches('\n');
                match change.tag() {
                    ChangeTag::Delete => println!("{}", style(format!("-{}", line)).red()),
                    ChangeTag::Insert => println!("{}", style(format!("+{}", line)).green()),
                    ChangeTag::Equal => println!(" {}", line),
                }
            }
        }
    }
}

pub fn run(path: &Path, env: &str, values: &ValuesArgs, dir: &Path, options: &RenderOptions) -> Result<()> {
    let prepared = pipeline::prepare(path, env, values, options.skip_schema)?;
    let result = pipeline::render(&prepared, options.lenient)?;
    let rendered = render::output_files(&result, options.show_only.as_deref(), options.normalize)?;

    let changes = compare(&rendered, dir)?;
    for change in &changes {
        print_change(change);
    }

    if !changes.is_empty() {
        println!();
    }
    println!("{}", style(summary(&changes)).bold());

    Ok(())
}
