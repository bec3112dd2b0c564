//! `bellwether` entry point.

use anyhow::Result;
use clap::Parser;

use cli::{commands, observability, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry = observability::init(cli.log_format)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Check(args) => commands::check::execute(&args).await,
        Commands::Render(args) => commands::render::execute(&args),
    }
}
