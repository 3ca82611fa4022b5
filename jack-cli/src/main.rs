//! Jack CLI
//!
//! Command-line front end for running ad hoc pipelines and console scripts
//! against a Jenkins-style build server.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Context, ServerArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jack")]
#[command(about = "Ad hoc Jenkins pipeline CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build output owns stdout; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jack_cli=info,jack_pipeline=info,jack_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let context = Context::new(cli.server.into_config()?)?;

    handle_command(cli.command, &context).await
}
