//! Tracing subscriber and OpenTelemetry wiring.
//!
//! All `tracing` spans and events emitted by every crate in the workspace flow
//! through the subscriber installed here: an `EnvFilter` (`RUST_LOG`, falling
//! back to `observability.log_level`), a fmt layer writing to stderr, and,
//! when `observability.otlp_endpoint` is set, an OTLP span exporter.

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, ObservabilitySection};

const SERVICE_NAME: &str = "langnode";

/// Keeps the span exporter alive; call [`TelemetryGuard::shutdown`] before
/// exiting so buffered spans are flushed.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Flushes and stops the exporter, if one was installed.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Span exporter did not shut down cleanly");
            }
        }
    }
}

/// Installs the global subscriber. Must be called once, inside the tokio
/// runtime when OTLP export is enabled.
pub fn init(config: &ObservabilitySection) -> anyhow::Result<TelemetryGuard> {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, rejected_env) = build_filter(env_directives.as_deref(), &config.log_level)?;

    let provider = match &config.otlp_endpoint {
        Some(endpoint) => Some(otlp_provider(endpoint)?),
        None => None,
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    let registry = tracing_subscriber::registry().with(filter).with(otel_layer);
    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.context("Failed to install tracing subscriber")?;

    if let Some(error) = rejected_env {
        tracing::warn!(
            %error,
            fallback = %config.log_level,
            "Ignoring invalid {}",
            EnvFilter::DEFAULT_ENV
        );
    }

    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::debug!(%endpoint, "Exporting spans over OTLP");
    }
    Ok(TelemetryGuard { provider })
}

fn otlp_provider(endpoint: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .with_context(|| format!("Failed to build OTLP exporter for {endpoint}"))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            SERVICE_NAME,
        )]))
        .build())
}

/// Chooses the log filter: `env_directives` (from `RUST_LOG`) when present and
/// valid, otherwise `log_level`. When the environment value is present but
/// invalid, its parse error is returned alongside the fallback filter.
fn build_filter(
    env_directives: Option<&str>,
    log_level: &str,
) -> anyhow::Result<(EnvFilter, Option<String>)> {
    let rejected = match env_directives {
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => return Ok((filter, None)),
            Err(e) => Some(e.to_string()),
        },
        None => None,
    };
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("Invalid log filter '{log_level}'"))?;
    Ok((filter, rejected))
}
