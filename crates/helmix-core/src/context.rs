//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::project::{Environment, Project};
use crate::values::Values;

/// Context available to all templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// User values (merged)
    pub values: JsonValue,

    /// Selected environment
    pub env: EnvInfo,

    /// Project metadata
    pub project: ProjectInfo,

    /// Current template info
    pub template: TemplateInfo,
}

/// Environment information for templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvInfo {
    /// Environment name (e.g. `production`)
    pub name: String,

    /// Target namespace, defaulting to the environment name
    pub namespace: String,
}

impl EnvInfo {
    pub fn new(name: &str, environment: &Environment) -> Self {
        Self {
            name: name.to_string(),
            namespace: environment
                .namespace
                .clone()
                .unwrap_or_else(|| name.to_string()),
        }
    }
}

/// Project information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl From<&Project> for ProjectInfo {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            version: project.version.as_ref().map(|v| v.to_string()),
            description: project.description.clone(),
        }
    }
}

/// Current template information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    /// Template name (path relative to `templates/`)
    pub name: String,

    /// Base path
    pub base_path: String,
}

impl TemplateContext {
    /// Create a new template context
    pub fn new(values: Values, env: EnvInfo, project: &Project) -> Self {
        Self {
            values: values.into_inner(),
            env,
            project: ProjectInfo::from(project),
            template: TemplateInfo::default(),
        }
    }

    /// Set the current template info
    pub fn with_template(mut self, name: &str, base_path: &str) -> Self {
        self.template = TemplateInfo {
            name: name.to_string(),
            base_path: base_path.to_string(),
        };
        self
    }
}
