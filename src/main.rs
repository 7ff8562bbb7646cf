//! Kolosal Sweep - Main Entry Point
//!
//! Runs pipeline searches from the command line.

use clap::Parser;
use kolosal_sweep::cli::{cmd_assess, cmd_create, cmd_pipelines, cmd_search, cmd_summary, Cli, Commands, CreateArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_sweep=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search { train, test, label, job_id, jobs_dir, cv_folds, options } => {
            cmd_search(train, test, label, job_id, jobs_dir, cv_folds, &options).await?;
        }
        Commands::Pipelines { options } => {
            cmd_pipelines(&options)?;
        }
        Commands::Create { train, test, label, key, job_id, jobs_dir, params, features, output } => {
            cmd_create(CreateArgs { train, test, label, key, job_id, jobs_dir, params, features, output })?;
        }
        Commands::Assess { model, data } => {
            cmd_assess(&model, &data)?;
        }
        Commands::Summary { report, top } => {
            cmd_summary(&report, top)?;
        }
    }

    Ok(())
}
