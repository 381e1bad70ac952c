//! Display formatting for CLI output
//!
//! Provides structured display for:
//! - Lint and validation issues grouped by file
//! - Render reports with suggestions
//! - Values provenance

use console::style;
use helmix_core::{SourceKind, ValuesSource};
use helmix_engine::RenderReport;
use std::collections::BTreeMap;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// An issue with location information
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub file: String,
    pub path: String,
    pub message: String,
}

/// Grouped issues for display
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, file: &str, path: &str, message: &str) {
        self.push(Severity::Error, file, path, message);
    }

    pub fn add_warning(&mut self, file: &str, path: &str, message: &str) {
        self.push(Severity::Warning, file, path, message);
    }

    fn push(&mut self, severity: Severity, file: &str, path: &str, message: &str) {
        self.issues.push(ValidationIssue {
            severity,
            file: file.to_string(),
            path: path.to_string(),
            message: message.to_string(),
        });
    }

    /// Display issues grouped by file
    pub fn display(&self) {
        let mut by_file: BTreeMap<&str, Vec<&ValidationIssue>> = BTreeMap::new();
        for issue in &self.issues {
            by_file.entry(&issue.file).or_default().push(issue);
        }

        for (file, issues) in by_file {
            println!();
            println!("{}", style(file).cyan().bold());

            for issue in issues {
                let icon = match issue.severity {
                    Severity::Error => style("✗").red(),
                    Severity::Warning => style("⚠").yellow(),
                };

                let path_display = if issue.path.is_empty() {
                    String::new()
                } else {
                    format!(" at {}", style(&issue.path).dim())
                };

                println!("  {} {}{}", icon, issue.message, path_display);
            }
        }
    }

    /// (errors, warnings)
    pub fn summary(&self) -> (usize, usize) {
        let errors = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        (errors, self.issues.len() - errors)
    }
}

/// Display a render report with errors grouped by template
pub fn display_render_report(report: &RenderReport) {
    println!(
        "  {} Template rendering failed: {}",
        style("✗").red(),
        style(report.summary()).bold()
    );
    println!();

    for (template_name, template_errors) in &report.errors_by_template {
        println!(
            "  {} {} ({})",
            style("→").blue(),
            style(template_name).yellow(),
            pluralize(template_errors.len(), "error", "errors")
        );

        for error in template_errors {
            println!("    {} {}", style("✗").red(), error.message);

            if let Some(suggestion) = &error.suggestion {
                println!("      {} {}", style("hint:").blue(), suggestion);
            }
        }
        println!();
    }

    if !report.successful_templates.is_empty() {
        println!(
            "  {} {} rendered successfully",
            style("✓").green(),
            pluralize(report.successful_templates.len(), "template", "templates")
        );
    }
}

fn kind_label(kind: SourceKind) -> console::StyledObject<String> {
    let label = format!("[{}]", kind);
    match kind {
        SourceKind::Plain => style(label).dim(),
        SourceKind::Encrypted => style(label).magenta(),
        SourceKind::Signed => style(label).green(),
    }
}

/// Values sources in merge order, before loading
pub fn display_sources(sources: &[ValuesSource]) {
    for (i, source) in sources.iter().enumerate() {
        let state = match (source.exists(), source.required) {
            (true, _) => style("found").green(),
            (false, true) => style("missing").red(),
            (false, false) => style("absent, skipped").dim(),
        };
        println!(
            "{:>3}. {} {} ({})",
            i + 1,
            kind_label(source.kind),
            source.path.display(),
            state
        );
    }
}

/// Format count with proper pluralization
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
