//! Shared load, validate and render steps used by the commands

use clap::Args;
use helmix_core::{
    EnvInfo, Envelope, Keyring, LoadedProject, LoadedValues, Schema, SchemaValidator,
    SignaturePolicy, TemplateContext, Values, ValuesLoader,
};
use helmix_engine::{Engine, RenderResult};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// Values-related flags shared by every command that loads values
#[derive(Args, Debug, Clone, Default)]
pub struct ValuesArgs {
    /// Extra values file(s), merged after the environment's files
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Set values on command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Require a valid GPG signature on every values file
    #[arg(long)]
    pub require_signatures: bool,

    /// GnuPG home directory
    #[arg(long, env = "GNUPGHOME")]
    pub gpg_homedir: Option<PathBuf>,
}

/// Everything needed to render one environment of a project
pub struct Prepared {
    pub project: LoadedProject,
    pub context: TemplateContext,
}

pub fn load_project(path: &Path) -> Result<LoadedProject> {
    let project = LoadedProject::load(path)?;
    tracing::debug!(
        name = %project.project.name,
        environments = project.project.environments.len(),
        "loaded project"
    );
    Ok(project)
}

/// Keyring for protected values files
///
/// `--gpg-homedir` (or `GNUPGHOME`) wins over `gpg.homedir` in helmix.yaml.
#[cfg(feature = "gpg")]
pub fn keyring(project: &LoadedProject, homedir: Option<&Path>) -> Box<dyn Keyring> {
    let homedir = homedir
        .map(Path::to_path_buf)
        .or_else(|| project.project.gpg.homedir.as_deref().map(|h| project.resolve(h)));
    Box::new(helmix_core::GpgKeyring::new().with_homedir(homedir))
}

#[cfg(not(feature = "gpg"))]
pub fn keyring(_project: &LoadedProject, _homedir: Option<&Path>) -> Box<dyn Keyring> {
    Box::new(helmix_core::NoKeyring)
}

pub fn signature_policy(project: &LoadedProject, require_signatures: bool) -> SignaturePolicy {
    SignaturePolicy {
        require_signatures: require_signatures || project.project.gpg.require_signatures,
        trusted_keys: project.project.gpg.trusted_keys.clone(),
    }
}

/// Resolve, decrypt, verify and merge the values for `env_name`
pub fn load_values(project: &LoadedProject, env_name: &str, args: &ValuesArgs) -> Result<LoadedValues> {
    let keyring = keyring(project, args.gpg_homedir.as_deref());
    let envelope = Envelope::new(
        keyring.as_ref(),
        signature_policy(project, args.require_signatures),
    );
    let loader = ValuesLoader::new(project, envelope);

    let loaded = loader.load(env_name, &args.values, &args.set)?;
    for source in &loaded.sources {
        match &source.signed_by {
            Some(signer) => tracing::info!(path = %source.path.display(), kind = %source.kind, %signer, "loaded values"),
            None => tracing::info!(path = %source.path.display(), kind = %source.kind, "loaded values"),
        }
    }
    Ok(loaded)
}

/// Compile the project schema, if it has one
pub fn schema_validator(project: &LoadedProject) -> Result<Option<SchemaValidator>> {
    project
        .load_schema()?
        .map(SchemaValidator::new)
        .transpose()
        .map_err(CliError::from)
}

/// Merge schema defaults below `values` and validate the result
pub fn apply_schema(project: &LoadedProject, values: Values) -> Result<Values> {
    let Some(validator) = schema_validator(project)? else {
        return Ok(values);
    };

    let values = Values::with_schema_defaults(validator.defaults_as_values(), values);
    let result = validator.validate(values.inner());
    if !result.is_valid {
        let details = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CliError::validation_with_help(
            format!(
                "{} value(s) do not match {}",
                result.errors.len(),
                schema_name(project)
            ),
            details,
        ));
    }

    tracing::debug!("values match schema");
    Ok(values)
}

pub fn schema_name(project: &LoadedProject) -> String {
    project
        .schema_path
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "schema".to_string())
}

/// Load the project, its values for `env_name`, and build the template context
pub fn prepare(path: &Path, env_name: &str, args: &ValuesArgs, skip_schema: bool) -> Result<Prepared> {
    let project = load_project(path)?;
    let environment = project.project.environment(env_name)?;
    let mut loaded = load_values(&project, env_name, args)?;

    if !skip_schema {
        loaded.values = apply_schema(&project, loaded.values)?;
    }

    let env = EnvInfo::new(env_name, &environment);
    let context = TemplateContext::new(loaded.values, env, &project.project);

    Ok(Prepared { project, context })
}

pub fn engine(project: &LoadedProject, lenient: bool) -> Engine {
    Engine::builder()
        .strict(project.project.engine.strict && !lenient)
        .build()
}

/// Render every template of a prepared project into memory
pub fn render(prepared: &Prepared, lenient: bool) -> Result<RenderResult> {
    let result = engine(&prepared.project, lenient).render_project(&prepared.project, &prepared.context)?;
    tracing::debug!(manifests = result.manifests.len(), "rendered project");
    Ok(result)
}

/// Load a schema from an explicit file instead of the project
pub fn external_schema(path: &Path) -> Result<SchemaValidator> {
    let schema = Schema::from_file(path)?;
    Ok(SchemaValidator::new(schema)?)
}
