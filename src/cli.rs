//! Command line interface
//!
//! robot run                - Keep configuration persisted until shutdown
//! robot show [--target T]  - Print effective configuration
//! robot validate           - Verify every stored configuration
//! robot set <target> <json> - Patch one configuration and apply it
//! robot init [--force]     - Write a default config file

use crate::config::AppConfig;
use crate::robot::{ConfigTarget, RobotConfig};
use crate::staging::ApplyOutcome;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::info;

/// Robot configuration CLI
#[derive(Parser, Debug)]
#[command(name = "robot")]
#[command(author, version, about = "Staged configuration for a trading robot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment files
    #[arg(short, long, default_value = "config", env = "ROBOT_CONFIG_DIR")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Keep configuration persisted until Ctrl+C or SIGTERM
    Run,

    /// Show effective configuration
    Show {
        /// Only this target (general, strategy:<id>, period:<name>)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Verify every stored configuration
    Validate,

    /// Merge a JSON object into a configuration and apply it
    Set {
        /// general, strategy:<id> or period:<name>
        target: String,
        /// JSON object with the fields to replace
        patch: String,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run_service<S>(app: &AppConfig, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let robot = RobotConfig::open(app).context("Failed to open robot configuration")?;
    let handle = robot.start_persistence();

    info!("Configuration service running, storage at {}", app.storage.dir.display());
    shutdown.await;
    info!("Shutdown requested, flushing configuration");

    let report = robot.shutdown_persistence(handle).await;
    if report.failed > 0 {
        bail!("{} configuration writes failed", report.failed);
    }
    Ok(())
}

pub fn show_config(app: &AppConfig, target: Option<&str>) -> Result<()> {
    let robot = RobotConfig::open(app).context("Failed to open robot configuration")?;
    if let Some(target) = target {
        ConfigTarget::parse(target)?;
    }

    let mut shown = 0;
    for (name, entity) in robot.effective_entities() {
        if target.is_some_and(|t| t != name) {
            continue;
        }
        let json = entity.to_json().context("Failed to serialize configuration")?;
        println!("\x1b[36m# {}\x1b[0m", name);
        println!("{}", serde_json::to_string_pretty(&json)?);
        shown += 1;
    }

    if shown == 0 {
        if let Some(target) = target {
            bail!("No configuration named {}", target);
        }
    }
    Ok(())
}

pub fn validate_config(app: &AppConfig) -> Result<()> {
    let robot = RobotConfig::open(app).context("Failed to open robot configuration")?;

    let mut problems = 0;
    for (target, errors) in robot.verify_all() {
        if errors.is_empty() {
            println!("  \x1b[32m✓\x1b[0m {}", target);
            continue;
        }
        println!("  \x1b[31m✗\x1b[0m {}", target);
        for error in &errors {
            println!("      {}", error);
        }
        problems += errors.len();
    }

    if problems > 0 {
        bail!("{} configuration problems found", problems);
    }
    Ok(())
}

pub fn set_config(app: &AppConfig, target: &str, patch: &str) -> Result<()> {
    let patch: serde_json::Value =
        serde_json::from_str(patch).context("Patch is not valid JSON")?;
    let robot = RobotConfig::open(app).context("Failed to open robot configuration")?;

    let outcome = robot.apply_json_patch(target, &patch)?;
    match &outcome {
        ApplyOutcome::Promoted(changes) => println!("  \x1b[32m✓\x1b[0m {} updated: {}", target, changes),
        ApplyOutcome::InSync => println!("  {} unchanged", target),
        ApplyOutcome::Deferred(changes) => println!("  {} pending: {}", target, changes),
        ApplyOutcome::Rejected(errors) => {
            for error in errors {
                println!("  \x1b[31m✗\x1b[0m {}", error);
            }
            bail!("{} rejected", target);
        }
    }

    let report = robot.shutdown();
    if report.failed > 0 {
        bail!("Failed to save {}", target);
    }
    Ok(())
}

pub fn init_config(config_dir: &Path, force: bool) -> Result<()> {
    let path = config_dir.join("default.toml");
    if path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }

    AppConfig::write_default(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  \x1b[32m✓\x1b[0m Wrote {}", path.display());
    Ok(())
}
