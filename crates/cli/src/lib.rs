//! Bellwether CLI.
//!
//! The binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Parse configuration**: load `bellwether.toml`, apply environment
//!    overrides, and validate it ([`settings`]).
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or pretty
//!    layer, plus an OpenTelemetry OTLP exporter when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set ([`observability`]).
//! 3. **Construct infrastructure**: build the SMTP, Slack, and PagerDuty
//!    transports (or the no-op transport) and the dead-letter sinks, and
//!    inject them into the dispatcher ([`wiring`]).
//! 4. **Run a command** ([`commands`]).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub mod commands;
pub mod observability;
pub mod settings;
pub mod wiring;

/// Delivers workflow-execution notifications by email, Slack, and PagerDuty.
#[derive(Debug, Parser)]
#[command(name = "bellwether", version, about)]
pub struct Cli {
    /// Log output format.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "BELLWETHER_LOG_FORMAT",
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable, for terminals.
    Pretty,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read phase transitions and deliver their notifications.
    Run(commands::run::RunArgs),
    /// Validate the configuration and print what would be used.
    Check(commands::check::CheckArgs),
    /// Preview rendered notifications for a sample execution.
    Render(commands::render::RenderArgs),
}

/// `--config` shared by every command.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Configuration file. Without it, `bellwether.toml` is used if present.
    #[arg(long, short, env = "BELLWETHER_CONFIG")]
    pub config: Option<PathBuf>,
}
