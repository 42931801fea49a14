//! Plotweave CLI Binary
//!
//! Command-line interface for inspecting, exporting, importing, and migrating
//! story contexts.

use clap::Parser;
use plotweave::cli::{Cli, RunContext};
use plotweave::config::ConfigLoader;
use plotweave::logging::{init_logging, LogFormat, LogOutput, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = match build_logging_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid logging option: {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    info!(command = cli.command.name(), "Plotweave CLI starting");

    let result = runtime.block_on(async {
        let context = RunContext::new(cli.workspace.clone(), cli.config.clone(), cli.store.clone())
            .await
            .inspect_err(|e| error!("Error opening store: {:#}", e))?;
        context.execute(&cli.command).await
    });

    match result {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{}", plotweave::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults. The
/// `PLOTWEAVE_LOG*` environment variables are applied later by `init_logging`.
fn build_logging_config(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.parse::<LogFormat>()?;
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.parse::<LogOutput>()?;
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
        if cli.log_output.is_none() {
            config.output = LogOutput::File;
        }
    }

    Ok(config)
}
