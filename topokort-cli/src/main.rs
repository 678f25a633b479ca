//! Topokort CLI - printable topographic maps from GPX tracks.

mod commands;
mod error;
mod runner;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::common::LayoutArgs;
use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "topokort", version, about = "Turn GPX tracks into printable multi-page topographic maps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a track to a multi-page PDF
    Render(RenderArgs),

    /// Print the page plan for a track
    Layout(LayoutArgs),

    /// View or initialize the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Render(args) => commands::render::run(args).await,
        Commands::Layout(args) => commands::layout::run(args),
        Commands::Config { command } => commands::config::run(command),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
