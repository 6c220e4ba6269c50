use anyhow::{bail, Context, Result};
use clap::Parser;
use robot_staging::cli::{self, Cli, Commands};
use robot_staging::config::AppConfig;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = &cli.command {
        init_logging_simple();
        return cli::init_config(&cli.config_dir, *force);
    }

    let app = AppConfig::load_from(&cli.config_dir).with_context(|| {
        format!("Failed to load configuration from {}", cli.config_dir.display())
    })?;
    if let Err(errors) = app.validate() {
        bail!("Invalid configuration: {}", errors.join("; "));
    }

    match &cli.command {
        Commands::Run => {
            let _guard = init_logging(&app.logging);
            cli::run_service(&app, shutdown_signal()).await?;
        }
        Commands::Show { target } => {
            init_logging_simple();
            cli::show_config(&app, target.as_deref())?;
        }
        Commands::Validate => {
            init_logging_simple();
            cli::validate_config(&app)?;
        }
        Commands::Set { target, patch } => {
            init_logging_simple();
            cli::set_config(&app, target, patch)?;
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}
