//! Tracing subscriber and OpenTelemetry export.
//!
//! Every crate in the workspace emits `tracing` spans and events; this module
//! installs the single subscriber that receives them. Logs go to stderr so
//! that command output on stdout stays machine-readable.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `RUST_LOG` | `EnvFilter` directives; defaults to `info` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | enables the OTLP span exporter (gRPC) |

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::LogFormat;

pub const SERVICE_NAME: &str = "bellwether";
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Flushes and shuts down the span exporter when dropped.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down OpenTelemetry exporter: {e}");
            }
        }
    }
}

/// Installs the global subscriber. Must run inside the Tokio runtime when
/// OTLP export is enabled.
pub fn init(format: LogFormat) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = format == LogFormat::Json;
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });
    let pretty_layer =
        (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    let provider = match std::env::var(OTLP_ENDPOINT_VAR) {
        Ok(endpoint) if !endpoint.is_empty() => Some(tracer_provider()?),
        _ => None,
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    if provider.is_some() {
        tracing::info!("OpenTelemetry span export enabled");
    }
    Ok(TelemetryGuard { provider })
}

/// The exporter reads its endpoint and headers from the standard
/// `OTEL_EXPORTER_OTLP_*` variables.
fn tracer_provider() -> Result<TracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .build()
        .context("failed to build OTLP span exporter")?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build())
}
