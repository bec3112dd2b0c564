//! `bellwether run`: read phase transitions and deliver notifications.
//!
//! Transitions are read from a JSON-lines file or stdin and submitted to the
//! delivery queue. Intake stops at end of input or on SIGINT/SIGTERM; the
//! queue is then drained, so every accepted notification is delivered or
//! dead-lettered before the process exits. Final counters are printed to
//! stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use delivery::{DeliveryQueue, QueueOptions};
use notifications::TransitionSource;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{settings, wiring, ConfigArgs};

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// JSON-lines file of phase transitions; `-` or omitted reads stdin.
    #[arg(long, short)]
    pub input: Option<PathBuf>,
}

/// What the intake loop saw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    pub transitions: u64,
    pub queued: u64,
    pub malformed: u64,
    /// Intake ended on a shutdown signal rather than end of input.
    pub interrupted: bool,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = settings::load(args.config.config.as_deref())?;
    let dispatcher = wiring::build_dispatcher(&config)?;
    let dead_letters = wiring::build_dead_letters(&config).await?;
    let queue = DeliveryQueue::start(
        Arc::new(dispatcher),
        dead_letters,
        QueueOptions::from_config(&config.delivery),
    );

    let mut source = listener::open_input(args.input.as_deref())
        .await
        .context("failed to open phase-transition input")?;

    let cancel = CancellationToken::new();
    let signals = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let intake = consume(source.as_mut(), &queue, &cancel).await;
    signals.abort();
    queue.shutdown().await;

    let report = intake?;
    let summary = serde_json::json!({ "intake": report, "delivery": queue.stats() });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Feeds every transition from `source` into `queue` until the source is
/// exhausted or `cancel` fires.
///
/// Malformed records are logged and skipped. An I/O error ends intake and is
/// returned after the caller drains the queue.
pub async fn consume(
    source: &mut dyn TransitionSource,
    queue: &DeliveryQueue,
    cancel: &CancellationToken,
) -> Result<IntakeReport> {
    let mut report = IntakeReport::default();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Shutdown requested; stopping intake");
                report.interrupted = true;
                break;
            }
            next = source.next_transition() => next,
        };

        let transition = match next {
            Ok(Some(transition)) => transition,
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                report.malformed += 1;
                tracing::warn!(error = %e, "Skipping malformed phase transition");
                continue;
            }
            Err(e) => return Err(e).context("phase-transition input failed"),
        };

        report.transitions += 1;
        let queued = queue
            .submit(&transition)
            .await
            .context("delivery queue closed during intake")?;
        report.queued += queued as u64;
    }

    tracing::info!(
        transitions = report.transitions,
        queued = report.queued,
        malformed = report.malformed,
        "Intake finished"
    );
    Ok(report)
}

/// Resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
///
/// A handler that cannot be installed is logged and never resolves, so the
/// run continues until end of input.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use delivery::{ChannelDispatcher, MemoryDeadLetters, NoopTransport};
    use listener::JsonLinesSource;
    use notifications::NotificationsConfig;

    use super::*;

    const TRANSITION: &str = r##"{"execution":{"id":{"project":"flytesnacks","domain":"development","name":"NAME"},"phase":"FAILED","workflow":{"name":"int_doubler_wf"},"launch_plan":{"name":"int_doubler_wf"}},"notifications":[{"channel":"slack","phases":["FAILED"],"recipients":["#ops","#alerts"]},{"channel":"email","phases":["SUCCEEDED"],"recipients":["a@example.com"]}]}"##;

    fn noop_queue(dead_letters: Arc<MemoryDeadLetters>) -> DeliveryQueue {
        let settings = NotificationsConfig::default().render_settings().unwrap();
        let dispatcher = ChannelDispatcher::new(settings).with_slack(Arc::new(NoopTransport));
        DeliveryQueue::start(Arc::new(dispatcher), dead_letters, QueueOptions::default())
    }

    #[tokio::test]
    async fn consumes_until_end_of_input() {
        let input = format!(
            "{}\nnot json\n{}\n{}\n",
            TRANSITION.replace("NAME", "e1"),
            TRANSITION.replace("NAME", "e2"),
            TRANSITION.replace("NAME", "e1"),
        );
        let mut source = JsonLinesSource::new(input.as_bytes(), "test");
        let dead_letters = Arc::new(MemoryDeadLetters::new());
        let queue = noop_queue(dead_letters.clone());

        let report = consume(&mut source, &queue, &CancellationToken::new())
            .await
            .unwrap();
        queue.shutdown().await;

        // e1 repeated: its rule already fired, so nothing new is queued.
        assert_eq!(
            report,
            IntakeReport {
                transitions: 3,
                queued: 2,
                malformed: 1,
                interrupted: false,
            }
        );
        let stats = queue.stats();
        assert_eq!(stats.delivered, 4);
        assert_eq!(stats.duplicates, 1);
        assert!(dead_letters.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_intake() {
        let input = TRANSITION.replace("NAME", "e1");
        let mut source = JsonLinesSource::new(input.as_bytes(), "test");
        let queue = noop_queue(Arc::new(MemoryDeadLetters::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = consume(&mut source, &queue, &cancel).await.unwrap();
        queue.shutdown().await;

        assert!(report.interrupted);
        assert_eq!(report.transitions, 0);
    }
}
