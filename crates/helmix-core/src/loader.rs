//! Values loading for an environment
//!
//! Sources are resolved in a fixed order and merged so that the last one
//! wins:
//!
//! 1. `environments.<env>.values` from `helmix.yaml` (all required), or the
//!    convention list `values.yaml`, `values/<env>.yaml`,
//!    `values/<env>.secrets.yaml.gpg`, `values/<env>.secrets.yaml.asc`
//!    (each optional)
//! 2. extra files passed with `-f/--values` (required)
//! 3. `--set key=value` overrides

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::envelope::{self, Envelope, SignatureStatus};
use crate::error::{CoreError, Result};
use crate::project::LoadedProject;
use crate::values::{Values, parse_set_values};

/// How a values file is protected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Plain,
    Encrypted,
    Signed,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Plain => write!(f, "plain"),
            SourceKind::Encrypted => write!(f, "encrypted"),
            SourceKind::Signed => write!(f, "signed"),
        }
    }
}

/// One entry in the ordered list of values inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuesSource {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub required: bool,
}

impl ValuesSource {
    /// Classify a path by extension and by any detached signature next to it
    pub fn detect(path: PathBuf, required: bool) -> Self {
        let kind = if envelope::is_encrypted(&path) {
            SourceKind::Encrypted
        } else if envelope::detached_signature(&path).is_some() {
            SourceKind::Signed
        } else {
            SourceKind::Plain
        };
        Self {
            path,
            kind,
            required,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// A source that was actually read and merged
#[derive(Debug, Clone, Serialize)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
}

/// Result of loading: the merged values plus their provenance
#[derive(Debug, Clone)]
pub struct LoadedValues {
    pub values: Values,
    pub sources: Vec<LoadedSource>,
    /// Number of `--set` overrides applied on top
    pub overrides: usize,
}

/// Resolves and loads the values for one environment of a project
pub struct ValuesLoader<'a> {
    project: &'a LoadedProject,
    envelope: Envelope<'a>,
}

impl<'a> ValuesLoader<'a> {
    pub fn new(project: &'a LoadedProject, envelope: Envelope<'a>) -> Self {
        Self { project, envelope }
    }

    /// List the sources for `env_name` in merge order
    ///
    /// `extra_files` are taken as given (relative to the working
    /// directory), environment files relative to the project root.
    pub fn resolve_sources(&self, env_name: &str, extra_files: &[PathBuf]) -> Result<Vec<ValuesSource>> {
        let environment = self.project.project.environment(env_name)?;

        let mut sources: Vec<ValuesSource> = match &environment.values {
            Some(paths) => paths
                .iter()
                .map(|p| ValuesSource::detect(self.project.resolve(p), true))
                .collect(),
            None => convention_paths(env_name)
                .into_iter()
                .map(|p| ValuesSource::detect(self.project.root.join(p), false))
                .collect(),
        };

        sources.extend(
            extra_files
                .iter()
                .map(|p| ValuesSource::detect(p.clone(), true)),
        );

        Ok(sources)
    }

    /// Load and merge every source, then apply `--set` overrides
    pub fn load(
        &self,
        env_name: &str,
        extra_files: &[PathBuf],
        set_values: &[String],
    ) -> Result<LoadedValues> {
        let mut values = Values::new();
        let mut loaded = Vec::new();

        for source in self.resolve_sources(env_name, extra_files)? {
            if !source.exists() {
                if source.required {
                    return Err(CoreError::ValuesNotFound {
                        path: source.path.display().to_string(),
                    });
                }
                tracing::debug!(path = %source.path.display(), "optional values file absent, skipping");
                continue;
            }

            let (file_values, signed_by) = self.load_source(&source)?;
            values.merge(&file_values);

            tracing::debug!(path = %source.path.display(), kind = %source.kind, "merged values");
            loaded.push(LoadedSource {
                path: source.path,
                kind: source.kind,
                signed_by,
            });
        }

        if !set_values.is_empty() {
            values.merge(&parse_set_values(set_values)?);
            tracing::debug!(count = set_values.len(), "applied --set overrides");
        }

        Ok(LoadedValues {
            values,
            sources: loaded,
            overrides: set_values.len(),
        })
    }

    fn load_source(&self, source: &ValuesSource) -> Result<(Values, Option<String>)> {
        let path_str = source.path.display().to_string();

        let opened = self
            .envelope
            .open(&source.path)
            .map_err(|source| CoreError::Envelope {
                path: path_str.clone(),
                source,
            })?;

        let values = Values::from_yaml(&opened.content).map_err(|e| match e {
            CoreError::YamlParse(err) => CoreError::InvalidValues {
                path: path_str.clone(),
                message: err.to_string(),
            },
            CoreError::InvalidValues { message, .. } => CoreError::InvalidValues {
                path: path_str.clone(),
                message,
            },
            other => other,
        })?;

        let signed_by = match opened.signature {
            SignatureStatus::Good { signer, fingerprint } => {
                Some(format!("{} ({})", signer, fingerprint))
            }
            SignatureStatus::Unsigned => None,
        };

        Ok((values, signed_by))
    }
}

/// Convention list used when an environment names no values files
fn convention_paths(env_name: &str) -> Vec<PathBuf> {
    vec![
        PathBuf::from("values.yaml"),
        Path::new("values").join(format!("{}.yaml", env_name)),
        Path::new("values").join(format!("{}.secrets.yaml.gpg", env_name)),
        Path::new("values").join(format!("{}.secrets.yaml.asc", env_name)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{NoKeyring, SignaturePolicy};
    use std::fs;
    use tempfile::TempDir;

    fn project(descriptor: &str, files: &[(&str, &str)]) -> (TempDir, LoadedProject) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("helmix.yaml"), descriptor).unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let loaded = LoadedProject::load(dir.path()).unwrap();
        (dir, loaded)
    }

    fn envelope(require: bool) -> Envelope<'static> {
        Envelope::new(
            &NoKeyring,
            SignaturePolicy {
                require_signatures: require,
                trusted_keys: vec![],
            },
        )
    }

    #[test]
    fn test_convention_sources_merge_in_order() {
        let (_dir, project) = project(
            "apiVersion: helmix/v1\nname: app",
            &[
                ("values.yaml", "replicas: 1\nimage:\n  tag: latest\n"),
                ("values/production.yaml", "replicas: 5\n"),
            ],
        );
        let loader = ValuesLoader::new(&project, envelope(false));

        let loaded = loader.load("production", &[], &[]).unwrap();

        assert_eq!(loaded.values.get("replicas").unwrap(), 5);
        assert_eq!(loaded.values.get("image.tag").unwrap(), "latest");
        assert_eq!(loaded.sources.len(), 2);
        assert!(loaded.sources[1].path.ends_with("values/production.yaml"));
    }

    #[test]
    fn test_missing_optional_sources_are_skipped() {
        let (_dir, project) = project("apiVersion: helmix/v1\nname: app", &[]);
        let loader = ValuesLoader::new(&project, envelope(false));

        let loaded = loader.load("staging", &[], &[]).unwrap();
        assert!(loaded.values.is_empty());
        assert!(loaded.sources.is_empty());
    }

    #[test]
    fn test_explicit_environment_files_are_required() {
        let (_dir, project) = project(
            "apiVersion: helmix/v1\nname: app\nenvironments:\n  prod:\n    values: [base.yaml, missing.yaml]",
            &[("base.yaml", "a: 1")],
        );
        let loader = ValuesLoader::new(&project, envelope(false));

        let err = loader.load("prod", &[], &[]).unwrap_err();
        assert!(matches!(err, CoreError::ValuesNotFound { ref path } if path.ends_with("missing.yaml")));
    }

    #[test]
    fn test_extra_files_and_set_override_last() {
        let (dir, project) = project(
            "apiVersion: helmix/v1\nname: app",
            &[("values.yaml", "tier: base\nport: 80\n"), ("extra.yaml", "tier: extra\n")],
        );
        let loader = ValuesLoader::new(&project, envelope(false));

        let loaded = loader
            .load(
                "dev",
                &[dir.path().join("extra.yaml")],
                &["port=8080".to_string()],
            )
            .unwrap();

        assert_eq!(loaded.values.get("tier").unwrap(), "extra");
        assert_eq!(loaded.values.get("port").unwrap(), 8080);
        assert_eq!(loaded.overrides, 1);
    }

    #[test]
    fn test_resolve_sources_classifies_kinds() {
        let (dir, project) = project(
            "apiVersion: helmix/v1\nname: app",
            &[
                ("values/prod.yaml", "a: 1"),
                ("values/prod.yaml.sig", "sig"),
            ],
        );
        let loader = ValuesLoader::new(&project, envelope(false));

        let sources = loader.resolve_sources("prod", &[]).unwrap();
        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind).collect();

        assert_eq!(
            kinds,
            vec![
                SourceKind::Plain,
                SourceKind::Signed,
                SourceKind::Encrypted,
                SourceKind::Encrypted
            ]
        );
        assert!(sources.iter().all(|s| !s.required));
        assert!(sources[1].path.starts_with(dir.path()));
    }

    #[test]
    fn test_required_signatures_reject_plain_file() {
        let (_dir, project) = project(
            "apiVersion: helmix/v1\nname: app",
            &[("values.yaml", "a: 1")],
        );
        let loader = ValuesLoader::new(&project, envelope(true));

        let err = loader.load("dev", &[], &[]).unwrap_err();
        assert!(err.is_verification());
    }

    #[test]
    fn test_malformed_values_names_file() {
        let (_dir, project) = project(
            "apiVersion: helmix/v1\nname: app",
            &[("values.yaml", "image: [oops")],
        );
        let loader = ValuesLoader::new(&project, envelope(false));

        let err = loader.load("dev", &[], &[]).unwrap_err();
        match err {
            CoreError::InvalidValues { path, .. } => assert!(path.ends_with("values.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_loading_does_not_modify_files() {
        let (dir, project) = project(
            "apiVersion: helmix/v1\nname: app",
            &[("values.yaml", "replicas: 1 # keep me\n")],
        );
        let loader = ValuesLoader::new(&project, envelope(false));

        loader.load("dev", &[], &["replicas=9".to_string()]).unwrap();

        let on_disk = fs::read_to_string(dir.path().join("values.yaml")).unwrap();
        assert_eq!(on_disk, "replicas: 1 # keep me\n");
    }

    #[test]
    fn test_unknown_environment() {
        let (_dir, project) = project(
            "apiVersion: helmix/v1\nname: app\nenvironments:\n  prod: {}",
            &[],
        );
        let loader = ValuesLoader::new(&project, envelope(false));
        assert!(matches!(
            loader.load("qa", &[], &[]).unwrap_err(),
            CoreError::UnknownEnvironment { .. }
        ));
    }
}
