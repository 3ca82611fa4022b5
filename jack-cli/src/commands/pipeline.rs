//! Pipeline command handlers
//!
//! Creates or updates an ad hoc pipeline job from a script file and, for
//! `run`, builds it and streams the console until the build ends.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use jack_client::JenkinsClient;
use jack_core::domain::build::PipelineBuild;
use jack_pipeline::{PipelineError, PipelineOrchestrator};
use tokio_util::sync::CancellationToken;

use super::read_script;
use crate::config::Context;
use crate::output::TerminalSink;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create/update the job, build it and stream its console
    ///
    /// Ctrl-C aborts the build; the stream keeps going until the server ends it.
    Run {
        /// Path to the pipeline script
        file: String,

        /// Job name (the configured prefix is prepended)
        #[arg(short, long)]
        job: String,

        /// Extra readiness rounds after the first one times out
        #[arg(long, default_value = "0")]
        wait_retries: u32,
    },
    /// Create/update the job without building it
    Update {
        /// Path to the pipeline script
        file: String,

        /// Job name (the configured prefix is prepended)
        #[arg(short, long)]
        job: String,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, context: &Context) -> Result<()> {
    match command {
        PipelineCommands::Run {
            file,
            job,
            wait_retries,
        } => run_pipeline(&context.orchestrator, &file, &job, wait_retries).await,
        PipelineCommands::Update { file, job } => {
            update_pipeline(&context.orchestrator, &file, &job).await
        }
    }
}

/// Build a pipeline and stream it
async fn run_pipeline(
    orchestrator: &PipelineOrchestrator<JenkinsClient>,
    file: &str,
    job: &str,
    wait_retries: u32,
) -> Result<()> {
    let script = read_script(file)?;
    let sink = TerminalSink;
    let token = CancellationToken::new();

    let run = orchestrator.synchronize_and_trigger(&script, job, &sink, &sink, &token);
    let mut result = abort_on_ctrl_c(orchestrator, &token, run).await;

    let mut retries = wait_retries;
    while retries > 0 && matches!(result, Err(PipelineError::BuildTimeout { .. })) {
        retries -= 1;
        if let Err(e) = &result {
            eprintln!("{} {}", "!".yellow().bold(), e.to_string().yellow());
        }
        eprintln!("{}", "Waiting for the build again...".dimmed());

        let resume = orchestrator.resume(&sink, &sink, &token);
        result = abort_on_ctrl_c(orchestrator, &token, resume).await;
    }

    let build = result?;
    println!();
    println!("{}", format!("✓ {} finished streaming", build).green().bold());
    Ok(())
}

/// Drives `run`, aborting the active build the first time Ctrl-C is pressed
async fn abort_on_ctrl_c<F>(
    orchestrator: &PipelineOrchestrator<JenkinsClient>,
    token: &CancellationToken,
    run: F,
) -> jack_pipeline::Result<PipelineBuild>
where
    F: std::future::Future<Output = jack_pipeline::Result<PipelineBuild>>,
{
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            token.cancel();
            match orchestrator.abort().await {
                Ok(Some(build)) => eprintln!("{}", format!("Abort signal sent to {}", build).yellow()),
                Ok(None) => eprintln!("{}", "No build triggered yet; nothing to abort".yellow()),
                Err(e) => eprintln!("{} {}", "Failed to abort:".red(), e),
            }
            run.await
        }
    }
}

/// Create or update a pipeline job
async fn update_pipeline(
    orchestrator: &PipelineOrchestrator<JenkinsClient>,
    file: &str,
    job: &str,
) -> Result<()> {
    let script = read_script(file)?;
    let sink = TerminalSink;

    let build = orchestrator
        .update_pipeline(&script, job, &sink, &CancellationToken::new())
        .await?;

    println!("{}", "✓ Pipeline updated successfully!".green().bold());
    println!("  Job:        {}", build.job.cyan());
    if let Some(number) = build.next_build_number {
        println!("  Next build: {}", format!("#{}", number).dimmed());
    }
    if build.has_params {
        println!("  Parameters: {}", "yes".dimmed());
    }
    Ok(())
}
