//! abigate - ABI compatibility matrix harness CLI
//!
//! ## Commands
//!
//! - `run`: execute the full forward/backward compatibility matrix
//! - `tags`: print the discovered release catalog without building

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use abigate_core::{
    init_tracing, Architecture, CompatibilityRunner, HarnessConfig, ReleaseTag, RunReport,
    ShellInvoker, VersionCatalog,
};

#[derive(Parser)]
#[command(name = "abigate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ABI compatibility matrix harness", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full compatibility matrix
    Run {
        /// Root of the live source tree
        #[arg(long, default_value = ".")]
        source_root: PathBuf,

        /// Scratch area for the history clone and per-release builds
        /// (default: <source-root>/tests/abiTests)
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Remote used to create the full-history clone
        #[arg(long)]
        remote: Option<String>,

        /// Oldest release tag to test, e.g. v1.7.5
        #[arg(long)]
        min_version: Option<String>,

        /// Architecture to test (repeatable; default: all)
        #[arg(long = "arch")]
        architectures: Vec<String>,

        /// Reference payload file round-tripped through the consumer
        /// (repeatable; relative to the test directory)
        #[arg(long = "payload")]
        payloads: Vec<PathBuf>,

        /// Build-internal parallelism (make -j N)
        #[arg(long)]
        jobs: Option<u32>,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Remove the scratch area after the run instead of leaving
        /// the per-release artifacts for inspection
        #[arg(long)]
        no_keep: bool,
    },

    /// Print the discovered release catalog
    Tags {
        /// Root of the live source tree
        #[arg(long, default_value = ".")]
        source_root: PathBuf,

        /// Remote used to create the full-history clone
        #[arg(long)]
        remote: Option<String>,

        /// Oldest release tag to list, e.g. v1.7.5
        #[arg(long)]
        min_version: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            source_root,
            scratch_dir,
            remote,
            min_version,
            architectures,
            payloads,
            jobs,
            report,
            no_keep,
        } => {
            let config = build_config(
                source_root,
                scratch_dir,
                remote,
                min_version,
                architectures,
                payloads,
                jobs,
                no_keep,
            )?;
            cmd_run(config, report.as_deref()).await
        }
        Commands::Tags {
            source_root,
            remote,
            min_version,
        } => {
            let config = build_config(
                source_root,
                None,
                remote,
                min_version,
                Vec::new(),
                Vec::new(),
                None,
                false,
            )?;
            cmd_tags(config).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    source_root: PathBuf,
    scratch_dir: Option<PathBuf>,
    remote: Option<String>,
    min_version: Option<String>,
    architectures: Vec<String>,
    payloads: Vec<PathBuf>,
    jobs: Option<u32>,
    no_keep: bool,
) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::for_source_root(source_root);
    if let Some(dir) = scratch_dir {
        config.scratch_dir = dir;
    }
    if let Some(url) = remote {
        config.remote_url = url;
    }
    if let Some(floor) = min_version {
        config.floor = floor
            .parse::<ReleaseTag>()
            .with_context(|| format!("invalid --min-version '{floor}'"))?;
    }
    if !architectures.is_empty() {
        config.architectures = architectures
            .iter()
            .map(|a| a.parse::<Architecture>().map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()
            .context("invalid --arch")?;
    }
    if !payloads.is_empty() {
        config.payloads = payloads;
    }
    config.jobs = jobs;
    config.keep_artifacts = !no_keep;
    Ok(config)
}

async fn cmd_run(config: HarnessConfig, report_path: Option<&std::path::Path>) -> Result<()> {
    let invoker = ShellInvoker::new();

    VersionCatalog::ensure_full_clone(&invoker, &config.remote_url, &config.clone_dir())
        .await
        .context("failed to obtain a full-history clone")?;
    let catalog = VersionCatalog::discover(&invoker, &config.clone_dir(), config.floor)
        .await
        .context("failed to discover release tags")?;
    info!(
        releases = catalog.len(),
        floor = %config.floor,
        "catalog: {}",
        catalog
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let runner = CompatibilityRunner::new(&invoker, &config);
    let outcome = runner.run(&catalog).await?;

    if let Some(path) = report_path {
        RunReport::new(config.clone(), catalog, outcome.clone())
            .write_json(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "wrote run report");
    }

    if !config.keep_artifacts {
        std::fs::remove_dir_all(&config.scratch_dir)
            .with_context(|| format!("failed to remove {}", config.scratch_dir.display()))?;
    }

    if outcome.passed {
        info!(
            cases = outcome.cases.len(),
            "all compatibility checks passed"
        );
        Ok(())
    } else {
        if let Some(first) = outcome.first_failure {
            warn!(
                passed = outcome.passed_count(),
                failed = outcome.failed_count(),
                release = %first.release,
                arch = %first.arch,
                direction = %first.direction,
                "compatibility failures detected"
            );
        }
        std::process::exit(1);
    }
}

async fn cmd_tags(config: HarnessConfig) -> Result<()> {
    let invoker = ShellInvoker::new();
    VersionCatalog::ensure_full_clone(&invoker, &config.remote_url, &config.clone_dir())
        .await
        .context("failed to obtain a full-history clone")?;
    let catalog = VersionCatalog::discover(&invoker, &config.clone_dir(), config.floor)
        .await
        .context("failed to discover release tags")?;
    for release in catalog {
        println!("{release}");
    }
    Ok(())
}
