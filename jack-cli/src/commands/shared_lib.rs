//! Shared library command handlers
//!
//! Lists the global variables and steps documented by the server and shows
//! the documentation of one of them.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use jack_pipeline::service::SharedLibDisplay;

use crate::config::Context;

/// Shared library subcommands
#[derive(Subcommand)]
pub enum SharedLibCommands {
    /// List documented variables and steps
    List,
    /// Show the documentation of one entry
    Show {
        /// Entry name, e.g. `env`
        name: String,
    },
}

/// Handle shared library commands
pub async fn handle_shared_lib_command(command: SharedLibCommands, context: &Context) -> Result<()> {
    match command {
        SharedLibCommands::List => list_entries(context).await,
        SharedLibCommands::Show { name } => show_entry(context, &name).await,
    }
}

async fn list_entries(context: &Context) -> Result<()> {
    let entries = context.orchestrator.list_shared_library_entries().await?;

    if entries.is_empty() {
        println!("{}", "No shared library entries found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} entries:", entries.len()).bold());
    println!();
    for entry in entries {
        let summary = entry.description.lines().next().unwrap_or_default();
        println!("  {} {}", "▸".cyan(), entry.name.bold());
        if !summary.is_empty() {
            println!("    {}", summary.dimmed());
        }
    }
    Ok(())
}

async fn show_entry(context: &Context, name: &str) -> Result<()> {
    let entries = context.orchestrator.list_shared_library_entries().await?;
    let entry = entries
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| anyhow::anyhow!("No shared library entry named '{}'", name))?;

    match context.orchestrator.shared_library_display(entry) {
        SharedLibDisplay::Browser(path) => {
            println!("{}", context.client.page_link(&path)?.underline());
        }
        SharedLibDisplay::Inline(html) => println!("{}", html),
    }
    Ok(())
}
