mod cmd;
mod progress;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{GlobOverrides, HashOverrides, TargetArgs};
use rummage::config;

#[derive(Parser)]
#[command(name = "rummage")]
#[command(about = "Find and fingerprint manifest and binary files inside container images")]
#[command(version)]
struct Cli {
    /// Override runtime selection (docker, podman)
    #[arg(long, global = true)]
    runtime: Option<String>,

    /// Output as JSON (optionally to a file)
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "-")]
    json: Option<String>,

    /// JSON file with globs and hashing settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat IMAGE as a running container and use `exec` instead of `run`
    #[arg(long, global = true)]
    container: bool,

    /// User to run commands as inside the image
    #[arg(long, global = true)]
    user: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobArgs {
    /// Glob selecting manifest files (repeatable)
    #[arg(long = "manifest-glob", value_name = "GLOB")]
    manifest_globs: Vec<String>,

    /// Glob selecting binary files to hash (repeatable)
    #[arg(long = "binary-glob", value_name = "GLOB")]
    binary_globs: Vec<String>,

    /// Glob of paths to ignore (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclusion_globs: Vec<String>,

    /// Top-level directory to skip when scanning / (repeatable, replaces dev, proc, sys)
    #[arg(long = "exclude-root-dir", value_name = "DIR")]
    exclude_root_dirs: Vec<String>,

    /// Directory to scan
    #[arg(long, default_value = "/")]
    path: String,

    /// Only look at the directory itself, not below it
    #[arg(long)]
    no_recursive: bool,
}

impl GlobArgs {
    fn overrides(&self) -> GlobOverrides {
        GlobOverrides {
            manifest_globs: self.manifest_globs.clone(),
            binary_globs: self.binary_globs.clone(),
            exclusion_globs: self.exclusion_globs.clone(),
            exclude_root_dirs: self.exclude_root_dirs.clone(),
        }
    }
}

#[derive(Args)]
struct HashArgs {
    /// Digest algorithm (sha1, sha256, sha512)
    #[arg(long)]
    hash_type: Option<String>,

    /// Files to stream at once
    #[arg(long)]
    concurrency: Option<usize>,
}

impl HashArgs {
    fn overrides(&self) -> HashOverrides {
        HashOverrides {
            hash_type: self.hash_type.clone(),
            concurrency: self.concurrency,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List manifest and binary files matching the globs
    Find {
        /// Image reference (or container with --container)
        image: String,
        #[command(flatten)]
        globs: GlobArgs,
    },

    /// Hash files inside the image
    Hash {
        /// Image reference (or container with --container)
        image: String,
        /// Absolute paths inside the image
        #[arg(required = true)]
        paths: Vec<String>,
        #[command(flatten)]
        hash: HashArgs,
    },

    /// Find matching files, then hash the binaries
    Scan {
        /// Image reference (or container with --container)
        image: String,
        #[command(flatten)]
        globs: GlobArgs,
        #[command(flatten)]
        hash: HashArgs,
    },

    /// Print a file from the image (empty if missing)
    Cat {
        /// Image reference (or container with --container)
        image: String,
        /// Absolute path inside the image
        path: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    config::init_from_cli(cli.runtime.clone())?;

    let json = cli.json.as_deref();
    let config_path = cli.config.as_deref();

    match &cli.command {
        Commands::Find { image, globs } => {
            let target = TargetArgs {
                image: image.as_str(),
                container: cli.container,
                user: cli.user.clone(),
            };
            cmd::find::run(
                target,
                config_path,
                &globs.overrides(),
                &globs.path,
                !globs.no_recursive,
                json,
            )
            .await
        }
        Commands::Hash { image, paths, hash } => {
            let target = TargetArgs {
                image: image.as_str(),
                container: cli.container,
                user: cli.user.clone(),
            };
            cmd::hash::run(target, config_path, &hash.overrides(), paths, json).await
        }
        Commands::Scan { image, globs, hash } => {
            let target = TargetArgs {
                image: image.as_str(),
                container: cli.container,
                user: cli.user.clone(),
            };
            cmd::scan::run(
                target,
                config_path,
                &globs.overrides(),
                &hash.overrides(),
                &globs.path,
                !globs.no_recursive,
                json,
            )
            .await
        }
        Commands::Cat { image, path } => {
            let target = TargetArgs {
                image: image.as_str(),
                container: cli.container,
                user: cli.user.clone(),
            };
            cmd::cat::run(target, path).await
        }
    }
}
