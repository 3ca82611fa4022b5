//! Console script command handlers
//!
//! Runs a script in the script console of the controller and/or agent
//! nodes, then prints every target's output in input order.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use jack_core::domain::node::FanoutTarget;
use jack_pipeline::service::render_fanout;
use tokio_util::sync::CancellationToken;

use super::read_script;
use crate::config::Context;
use crate::output::TerminalSink;

/// Console subcommands
#[derive(Subcommand)]
pub enum ConsoleCommands {
    /// Run a script on the selected targets
    Run {
        /// Path to the script
        file: String,

        /// Run on the controller
        #[arg(long)]
        system: bool,

        /// Run on a node, by display name (repeatable)
        #[arg(short, long)]
        node: Vec<String>,

        /// Run on every node whose name matches this regex
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// List the controller and every node
    Targets,
}

/// Handle console commands
pub async fn handle_console_command(command: ConsoleCommands, context: &Context) -> Result<()> {
    match command {
        ConsoleCommands::Run {
            file,
            system,
            node,
            pattern,
        } => run_script(context, &file, system, node, pattern).await,
        ConsoleCommands::Targets => list_targets(context).await,
    }
}

async fn run_script(
    context: &Context,
    file: &str,
    system: bool,
    nodes: Vec<String>,
    pattern: Option<String>,
) -> Result<()> {
    let script = read_script(file)?;

    let mut targets = Vec::new();
    if system {
        targets.push(FanoutTarget::Controller);
    }
    targets.extend(nodes.into_iter().map(FanoutTarget::Node));
    if let Some(pattern) = pattern {
        let matched = context.orchestrator.select_targets(&pattern).await?;
        if matched.is_empty() {
            eprintln!("{}", format!("No nodes match /{}/", pattern).yellow());
        }
        for target in matched {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    if targets.is_empty() {
        anyhow::bail!("No targets selected; use --system, --node or --pattern");
    }

    let sink = TerminalSink;
    let results = context
        .orchestrator
        .run_script_across_targets(&script, &targets, &sink, &CancellationToken::new())
        .await;

    for line in render_fanout(&results) {
        println!("{}", line);
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.target.label())
        .collect();
    if !failed.is_empty() {
        eprintln!("{} {}", "Failed on:".red().bold(), failed.join(", "));
    }
    Ok(())
}

async fn list_targets(context: &Context) -> Result<()> {
    let targets = context.orchestrator.list_targets().await?;

    println!("{}", format!("Found {} target(s):", targets.len()).bold());
    for target in targets {
        match target {
            FanoutTarget::Controller => println!(
                "  {} {} {}",
                "▸".cyan(),
                target.label().bold(),
                "(script console of the controller)".dimmed()
            ),
            FanoutTarget::Node(_) => println!("  {} {}", "▸".cyan(), target.label()),
        }
    }
    Ok(())
}
