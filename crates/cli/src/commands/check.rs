//! `bellwether check`: validate configuration without delivering anything.

use anyhow::Result;
use notifications::{BackendKind, ChannelKind, DeliveryConfig, NotificationsConfig};
use serde::Serialize;

use crate::{settings, wiring, ConfigArgs};

#[derive(Debug, clap::Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Printed as JSON on success. Secrets are never included.
#[derive(Debug, Serialize)]
pub struct CheckSummary<'a> {
    pub backend: BackendKind,
    pub sender: &'a str,
    pub html: bool,
    pub channels: Vec<ChannelStatus>,
    pub delivery: &'a DeliveryConfig,
}

#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub channel: ChannelKind,
    pub transport: bool,
}

pub async fn execute(args: &CheckArgs) -> Result<()> {
    let config = settings::load(args.config.config.as_deref())?;
    let summary = summarize(&config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Builds every transport the configuration names, which surfaces bad SMTP
/// hosts and HTTP client errors as well as template and tuning problems.
pub fn summarize(config: &NotificationsConfig) -> Result<CheckSummary<'_>> {
    let dispatcher = wiring::build_dispatcher(config)?;
    let channels = [ChannelKind::Email, ChannelKind::Slack, ChannelKind::PagerDuty]
        .into_iter()
        .map(|channel| ChannelStatus {
            channel,
            transport: dispatcher.has_transport(channel),
        })
        .collect();

    Ok(CheckSummary {
        backend: config.kind,
        sender: &config.emailer.sender,
        html: config.emailer.html,
        channels,
        delivery: &config.delivery,
    })
}
