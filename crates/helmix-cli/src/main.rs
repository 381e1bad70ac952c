//! helmix CLI - simple templating for Kubernetes deployments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod pipeline;

use commands::render::RenderOptions;
use pipeline::ValuesArgs;

#[derive(Parser)]
#[command(name = "helmix")]
#[command(version)]
#[command(about = "Render Kubernetes manifests from Jinja2 templates and GPG-protected values", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Flags shared by `render` and `diff`
#[derive(Args, Debug, Clone)]
struct RenderArgs {
    /// Show only manifests whose name contains this string
    #[arg(short = 's', long)]
    show_only: Option<String>,

    /// Re-serialize documents into canonical YAML
    #[arg(long)]
    normalize: bool,

    /// Render undefined values as empty instead of failing
    #[arg(long)]
    lenient: bool,

    /// Skip schema validation even if a schema exists
    #[arg(long)]
    skip_schema: bool,
}

impl RenderArgs {
    fn options(self, output_dir: Option<PathBuf>, stdout: bool) -> RenderOptions {
        RenderOptions {
            output_dir,
            stdout,
            show_only: self.show_only,
            normalize: self.normalize,
            lenient: self.lenient,
            skip_schema: self.skip_schema,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render manifests for an environment
    Render {
        /// Project path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Target environment
        #[arg(short, long, env = "HELMIX_ENV")]
        env: String,

        /// Output directory (defaults to `output.dir` in helmix.yaml, else stdout)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print to stdout even if helmix.yaml sets `output.dir`
        #[arg(long, conflicts_with = "output_dir")]
        stdout: bool,

        #[command(flatten)]
        render: RenderArgs,

        #[command(flatten)]
        values: ValuesArgs,
    },

    /// Check the descriptor, values, schema, templates and rendered output
    Lint {
        /// Project path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Environment to lint (default: every declared environment)
        #[arg(short, long, env = "HELMIX_ENV")]
        env: Option<String>,

        /// Fail on undefined values and Kubernetes shape problems
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        values: ValuesArgs,
    },

    /// Print the merged values for an environment
    Values {
        /// Project path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Target environment
        #[arg(short, long, env = "HELMIX_ENV")]
        env: String,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,

        /// List the values sources in merge order instead
        #[arg(long)]
        sources: bool,

        /// Skip schema defaults and validation
        #[arg(long)]
        skip_schema: bool,

        #[command(flatten)]
        values: ValuesArgs,
    },

    /// Validate merged values against the schema
    Validate {
        /// Project path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Target environment
        #[arg(short, long, env = "HELMIX_ENV")]
        env: String,

        /// External schema file to use (overrides the project schema)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Output validation results as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        values: ValuesArgs,
    },

    /// Diff a fresh render against a directory of rendered manifests
    Diff {
        /// Project path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Target environment
        #[arg(short, long, env = "HELMIX_ENV")]
        env: String,

        /// Directory holding the previous render
        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        #[command(flatten)]
        values: ValuesArgs,
    },

    /// Create a new project
    Init {
        /// Project name
        name: String,

        /// Parent directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Show project information
    Show {
        /// Project path
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Decrypt and verify a values file without printing it
    #[cfg(feature = "gpg")]
    Verify {
        /// Values file (`.gpg`/`.asc`, or plain with a detached `.sig`)
        file: PathBuf,

        /// GnuPG home directory
        #[arg(long, env = "GNUPGHOME")]
        gpg_homedir: Option<PathBuf>,

        /// Fingerprint allowed to sign (repeatable)
        #[arg(long = "trusted-key")]
        trusted_keys: Vec<String>,

        /// Fail if the file carries no signature
        #[arg(long)]
        require_signature: bool,
    },
}

fn init_tracing(debug: bool, quiet: bool) {
    let default = if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    match cli.command {
        Commands::Render {
            path,
            env,
            output_dir,
            stdout,
            render,
            values,
        } => commands::render::run(&path, &env, &values, &render.options(output_dir, stdout), cli.quiet),

        Commands::Lint {
            path,
            env,
            strict,
            values,
        } => commands::lint::run(&path, env.as_deref(), &values, strict),

        Commands::Values {
            path,
            env,
            json,
            sources,
            skip_schema,
            values,
        } => commands::values::run(&path, &env, &values, json, sources, skip_schema),

        Commands::Validate {
            path,
            env,
            schema,
            json,
            values,
        } => commands::validate::run(&path, &env, &values, schema.as_deref(), json),

        Commands::Diff {
            path,
            env,
            output_dir,
            render,
            values,
        } => commands::diff::run(&path, &env, &values, &output_dir, &render.options(None, false)),

        Commands::Init { name, output } => commands::init::run(&name, &output),

        Commands::Show { path } => commands::show::run(&path),

        #[cfg(feature = "gpg")]
        Commands::Verify {
            file,
            gpg_homedir,
            trusted_keys,
            require_signature,
        } => commands::verify::run(&file, gpg_homedir, &trusted_keys, require_signature),
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.debug, cli.quiet);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        tracing::debug!(code, "command failed");
        if !err.is_reported() {
            eprintln!("{:?}", miette::Report::new(err));
        }
        std::process::exit(code);
    }
}
