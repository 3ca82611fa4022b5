//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod build;
mod console;
mod pipeline;
mod shared_lib;

pub use build::BuildCommands;
pub use console::ConsoleCommands;
pub use pipeline::PipelineCommands;
pub use shared_lib::SharedLibCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Context;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create, update and build ad hoc pipelines
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Inspect and stop existing builds
    Build {
        #[command(subcommand)]
        command: BuildCommands,
    },
    /// Run scripts in the server's script console
    Console {
        #[command(subcommand)]
        command: ConsoleCommands,
    },
    /// Browse shared library documentation
    SharedLib {
        #[command(subcommand)]
        command: SharedLibCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, context: &Context) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, context).await,
        Commands::Build { command } => build::handle_build_command(command, context).await,
        Commands::Console { command } => console::handle_console_command(command, context).await,
        Commands::SharedLib { command } => {
            shared_lib::handle_shared_lib_command(command, context).await
        }
    }
}

/// Reads a script file
fn read_script(path: &str) -> Result<String> {
    use anyhow::Context as _;
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script file: {}", path))
}
