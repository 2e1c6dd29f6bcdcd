// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Soapbox - unattended social-post automation.
//!
//! This is the binary entry point: configuration loading, logging setup,
//! and the administrative command surface. All pipeline logic lives in the
//! component crates; commands here call their public operations and format
//! output.

mod app;
mod backup;
mod serve;
mod status;

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use soapbox_core::PostId;
use soapbox_pipeline::ProcessOutcome;
use tracing_subscriber::EnvFilter;

use crate::app::App;

/// Soapbox - unattended social-post automation.
#[derive(Parser, Debug)]
#[command(name = "soapbox", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the soapbox.toml hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the trigger loop and worker pool until interrupted.
    Serve,
    /// Run one pipeline pass immediately: a single post, or one full tick.
    RunNow {
        /// Process exactly this post instead of everything due.
        #[arg(long)]
        post: Option<String>,
    },
    /// Manage database backups.
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Inspect or clear the generation cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Show pipeline, cache, provider, and backup status.
    Status,
}

#[derive(Subcommand, Debug)]
enum BackupCommands {
    /// Take a snapshot now.
    Create,
    /// List archives, newest first.
    List,
    /// Replace the live database with an archive. Destructive.
    Restore {
        /// Archive file name, as printed by `backup list`.
        file: String,
        /// Confirm the overwrite.
        #[arg(long)]
        yes: bool,
    },
    /// Apply the retention policy now.
    Prune,
    /// Summarize the archive set.
    Status,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show hit/miss counters.
    Status,
    /// Invalidate every cached entry.
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = {
        let loaded = match &cli.config {
            Some(path) => soapbox_config::load_config_from_path(path)
                .map_err(soapbox_config::diagnostic::figment_to_config_errors)
                .and_then(|config| {
                    soapbox_config::validation::validate_config(&config)?;
                    Ok(config)
                }),
            None => soapbox_config::load_and_validate(),
        };
        match loaded {
            Ok(config) => config,
            Err(errors) => {
                soapbox_config::render_errors(&errors);
                std::process::exit(1);
            }
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.instance.log_level)),
        )
        .init();

    if let Err(err) = run(cli.command, config).await {
        eprintln!("soapbox: {err}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: soapbox_config::SoapboxConfig) -> Result<(), soapbox_core::SoapboxError> {
    match command {
        Commands::Serve => {
            let app = App::build(config).await?;
            serve::run(app).await
        }
        Commands::RunNow { post } => {
            let app = App::build(config).await?;
            match post {
                Some(id) => {
                    let outcome = app.orchestrator.run_now(&PostId(id.clone()), Utc::now()).await?;
                    println!("post {id}: {}", describe_outcome(&outcome));
                }
                None => {
                    serve::run_one_pass(&app).await?;
                }
            }
            app.store.close().await
        }
        Commands::Backup { command } => {
            let app = App::build(config).await?;
            let result = backup::run(&app, command).await;
            app.store.close().await?;
            result
        }
        Commands::Cache { command } => {
            let app = App::build(config).await?;
            match command {
                CacheCommands::Status => {
                    let stats = app.cache.stats();
                    println!(
                        "cache ({}): {} entries, {} hits, {} misses",
                        stats.backend, stats.entries, stats.hits, stats.misses
                    );
                }
                CacheCommands::Clear => {
                    app.cache.clear();
                    println!("cache cleared");
                }
            }
            app.store.close().await
        }
        Commands::Status => {
            let app = App::build(config).await?;
            let result = status::run(&app).await;
            app.store.close().await?;
            result
        }
    }
}

/// One line per outcome for command output.
fn describe_outcome(outcome: &ProcessOutcome) -> String {
    match outcome {
        ProcessOutcome::Published { remote_post_id } => {
            format!("published as {remote_post_id}")
        }
        ProcessOutcome::Retried { next_attempt_at } => {
            format!("retry scheduled for {next_attempt_at}")
        }
        ProcessOutcome::Failed { error } => format!("failed: {error}"),
        ProcessOutcome::Skipped { reason } => format!("skipped: {reason}"),
    }
}
