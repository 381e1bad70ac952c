//! Project descriptor (`helmix.yaml`) and loading

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// File name of the project descriptor
pub const PROJECT_FILE: &str = "helmix.yaml";

/// Supported descriptor API version
pub const API_VERSION: &str = "helmix/v1";

/// A helmix project - a directory of templates plus values per environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// API version (helmix/v1)
    pub api_version: String,

    /// Project name (required)
    pub name: String,

    /// Optional project version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Deployment environments, keyed by name
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,

    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// GPG configuration for protected values files
    #[serde(default)]
    pub gpg: GpgConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// A named deployment target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Kubernetes namespace exposed to templates as `env.namespace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Explicit, ordered values files (relative to the project root).
    /// When unset, the convention list is used instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<PathBuf>>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Fail on undefined variables
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// GPG configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpgConfig {
    /// Every values file must carry a valid signature
    #[serde(default)]
    pub require_signatures: bool,

    /// Fingerprints allowed to sign values files (empty = any key in the keyring)
    #[serde(default)]
    pub trusted_keys: Vec<String>,

    /// Alternative GnuPG home directory (relative to the project root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homedir: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Default output directory for `render -o`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Project {
    /// Parse a descriptor from YAML and validate it
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let project: Project = serde_yaml::from_str(yaml)?;
        project.validate()?;
        Ok(project)
    }

    fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(CoreError::InvalidProject {
                message: format!(
                    "Unsupported API version: {}. Expected: {}",
                    self.api_version, API_VERSION
                ),
            });
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidProject {
                message: "name must not be empty".to_string(),
            });
        }
        if let Some(key) = self
            .gpg
            .trusted_keys
            .iter()
            .find(|k| !crate::envelope::is_valid_trusted_key(k))
        {
            return Err(CoreError::InvalidProject {
                message: format!(
                    "gpg.trustedKeys entry '{}' must be a full fingerprint (40 hex digits) or a long key id (16 hex digits)",
                    key
                ),
            });
        }
        Ok(())
    }

    /// Look up an environment by name
    ///
    /// Projects that declare no environments accept any name, so a bare
    /// `values/<env>.yaml` layout works without a descriptor entry.
    pub fn environment(&self, name: &str) -> Result<Environment> {
        if self.environments.is_empty() {
            return Ok(Environment::default());
        }
        self.environments
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownEnvironment {
                name: name.to_string(),
                available: self
                    .environments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Loaded project with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Project descriptor
    pub project: Project,

    /// Root directory of the project
    pub root: PathBuf,

    /// Templates directory
    pub templates_dir: PathBuf,

    /// Schema file path (if present)
    pub schema_path: Option<PathBuf>,
}

impl LoadedProject {
    /// Load a project from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(CoreError::ProjectNotFound {
                path: root.display().to_string(),
            });
        }

        let project_file = root.join(PROJECT_FILE);
        if !project_file.exists() {
            return Err(CoreError::InvalidProject {
                message: format!("{} not found in {}", PROJECT_FILE, root.display()),
            });
        }

        let content = std::fs::read_to_string(&project_file)?;
        let project = Project::from_yaml(&content)?;

        tracing::debug!(name = %project.name, root = %root.display(), "loaded project");

        let templates_dir = root.join("templates");
        let schema_path = Self::find_schema_file(&root);

        Ok(Self {
            project,
            root,
            templates_dir,
            schema_path,
        })
    }

    /// Find schema file, checking the standard locations
    fn find_schema_file(root: &Path) -> Option<PathBuf> {
        ["values.schema.json", "values.schema.yaml"]
            .into_iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }

    /// Load the schema if present
    pub fn load_schema(&self) -> Result<Option<crate::schema::Schema>> {
        match &self.schema_path {
            Some(path) => Ok(Some(crate::schema::Schema::from_file(path)?)),
            None => Ok(None),
        }
    }

    /// Resolve a path from the descriptor against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Get the sorted list of template files
    pub fn template_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.templates_dir.exists() {
            return Ok(files);
        }

        for entry in walkdir::WalkDir::new(&self.templates_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if matches!(ext.as_str(), "yaml" | "yml" | "j2" | "jinja2" | "txt" | "json" | "tpl") {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Template name (path relative to `templates/`, forward slashes)
    pub fn template_name(&self, file: &Path) -> String {
        let rel = file.strip_prefix(&self.templates_dir).unwrap_or(file);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Whether a template is a partial (only included, never emitted)
pub fn is_partial(template_name: &str) -> bool {
    template_name
        .rsplit('/')
        .next()
        .map(|file| file.starts_with('_'))
        .unwrap_or(false)
}

/// Output name for a template: strip a trailing `.j2` / `.jinja2`
pub fn output_name(template_name: &str) -> &str {
    template_name
        .strip_suffix(".j2")
        .or_else(|| template_name.strip_suffix(".jinja2"))
        .unwrap_or(template_name)
}
