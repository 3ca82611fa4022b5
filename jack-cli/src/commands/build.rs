//! Build command handlers
//!
//! Streams the console of an existing build and stops builds in batches.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use jack_core::domain::build::BuildRef;
use tokio_util::sync::CancellationToken;

use crate::config::Context;
use crate::output::TerminalSink;

/// Build subcommands
#[derive(Subcommand)]
pub enum BuildCommands {
    /// Stream the console of a build
    Log {
        /// Full job name
        job: String,

        /// Build number
        number: u64,
    },
    /// Stop one or more builds of a job
    Abort {
        /// Full job name
        job: String,

        /// Build numbers
        #[arg(required = true)]
        numbers: Vec<u64>,
    },
}

/// Handle build commands
pub async fn handle_build_command(command: BuildCommands, context: &Context) -> Result<()> {
    match command {
        BuildCommands::Log { job, number } => stream_log(context, &job, number).await,
        BuildCommands::Abort { job, numbers } => abort_builds(context, &job, numbers).await,
    }
}

async fn stream_log(context: &Context, job: &str, number: u64) -> Result<()> {
    let sink = TerminalSink;
    let summary = context
        .orchestrator
        .stream_build_log(job, number, &sink, &sink, &CancellationToken::new())
        .await?;

    if summary.errors > 0 {
        eprintln!(
            "{}",
            format!("{} stream error(s) while reading the console", summary.errors).yellow()
        );
    }
    Ok(())
}

async fn abort_builds(context: &Context, job: &str, numbers: Vec<u64>) -> Result<()> {
    let builds: Vec<BuildRef> = numbers
        .into_iter()
        .map(|number| BuildRef::new(job, number))
        .collect();

    let outcomes = context.orchestrator.stop_builds(&builds).await;
    let failed = outcomes.iter().filter(|o| !o.success).count();

    for outcome in &outcomes {
        if outcome.success {
            println!("{} {}", "✓".green(), outcome.message);
        } else {
            println!("{} {}: {}", "✗".red(), outcome.build, outcome.message.red());
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} build(s) could not be stopped", failed, outcomes.len());
    }
    Ok(())
}
