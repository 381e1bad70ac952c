//! Rendered manifests parsed back into YAML documents
//!
//! Every rendered template goes through [`Manifest::parse`] so that broken
//! YAML is caught before anything is written. `lint` additionally runs
//! [`Manifest::check_kubernetes`] on each document.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use thiserror::Error;

/// RFC 1123 subdomain, the rule Kubernetes applies to most object names
static DNS_1123_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("DNS-1123 regex is valid")
});

const DNS_1123_MAX_LEN: usize = 253;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("{template} produced invalid YAML: {message}")]
    InvalidYaml { template: String, message: String },

    #[error("failed to serialize {template}: {message}")]
    Serialize { template: String, message: String },
}

/// A problem found by the Kubernetes shape check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestIssue {
    pub template: String,
    /// Zero-based document index within the template output
    pub document: usize,
    pub message: String,
}

impl std::fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (document {}): {}",
            self.template,
            self.document + 1,
            self.message
        )
    }
}

/// Rendered output of one template
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Output name (template path without `.j2`)
    pub name: String,

    /// Rendered text, exactly as the engine produced it
    pub content: String,

    /// Non-empty YAML documents found in `content`
    pub documents: Vec<YamlValue>,
}

impl Manifest {
    /// Split rendered text into YAML documents
    pub fn parse(name: &str, content: &str) -> Result<Self, ManifestError> {
        let mut documents = Vec::new();

        for document in serde_yaml::Deserializer::from_str(content) {
            let value = YamlValue::deserialize(document).map_err(|e| ManifestError::InvalidYaml {
                template: name.to_string(),
                message: e.to_string(),
            })?;
            if !value.is_null() {
                documents.push(value);
            }
        }

        Ok(Self {
            name: name.to_string(),
            content: content.to_string(),
            documents,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Re-serialize the documents in canonical form, `---` separated
    pub fn normalized(&self) -> Result<String, ManifestError> {
        let mut parts = Vec::with_capacity(self.documents.len());
        for doc in &self.documents {
            let text = serde_yaml::to_string(doc).map_err(|e| ManifestError::Serialize {
                template: self.name.clone(),
                message: e.to_string(),
            })?;
            parts.push(text);
        }
        Ok(parts.join("---\n"))
    }

    /// Check that every document looks like a Kubernetes object
    pub fn check_kubernetes(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        for (index, doc) in self.documents.iter().enumerate() {
            let mut issue = |message: String| {
                issues.push(ManifestIssue {
                    template: self.name.clone(),
                    document: index,
                    message,
                })
            };

            if !doc.is_mapping() {
                issue("document is not a mapping".to_string());
                continue;
            }

            for field in ["apiVersion", "kind"] {
                match doc.get(field) {
                    Some(YamlValue::String(s)) if !s.trim().is_empty() => {}
                    Some(_) => issue(format!("'{}' must be a non-empty string", field)),
                    None => issue(format!("missing '{}'", field)),
                }
            }

            let metadata = doc.get("metadata");
            let name = metadata.and_then(|m| m.get("name"));
            let generate_name = metadata.and_then(|m| m.get("generateName"));

            match (name, generate_name) {
                (Some(YamlValue::String(name)), _) => {
                    if let Some(problem) = check_dns_1123(name) {
                        issue(format!("metadata.name '{}' {}", name, problem));
                    }
                }
                (Some(_), _) => issue("metadata.name must be a string".to_string()),
                (None, Some(_)) => {}
                (None, None) => issue("missing 'metadata.name'".to_string()),
            }
        }

        issues
    }
}

fn check_dns_1123(name: &str) -> Option<&'static str> {
    if name.len() > DNS_1123_MAX_LEN {
        Some("is longer than 253 characters")
    } else if !DNS_1123_SUBDOMAIN.is_match(name) {
        Some("is not a valid DNS-1123 subdomain (lowercase alphanumerics, '-' and '.')")
    } else {
        None
    }
}
