//! Logging and span-export setup.
//!
//! [`init_telemetry`] installs the global `tracing` subscriber once at
//! process startup: an env-filtered console formatter (compact by default,
//! NDJSON with `AEROGUARD_LOG_FORMAT=json`), plus an OTLP span exporter when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` names a collector. `RUST_LOG` controls the
//! filter (default `info`).
//!
//! ```rust,no_run
//! // Hold the guard until the process exits so pending spans flush.
//! let _telemetry = aeroguard_agent::telemetry::init_telemetry("aeroguard");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Wire up the global subscriber and return the flush guard.
///
/// Span export is optional: without `OTEL_EXPORTER_OTLP_ENDPOINT` the
/// subscriber is console-only and the guard holds nothing.
pub fn init_telemetry(service_name: &str) -> TelemetryGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = otlp_provider(service_name);
    let spans = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("aeroguard")));

    let subscriber = tracing_subscriber::registry().with(filter).with(spans);
    if std::env::var("AEROGUARD_LOG_FORMAT").as_deref() == Ok("json") {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }

    TelemetryGuard { provider }
}

/// Flushes the span exporter on drop. Keep it alive in `main` for the whole
/// process lifetime; dropping it early silently stops span export.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[aeroguard] span exporter shutdown failed: {e}");
            }
        }
    }
}

/// OTLP provider for the collector named by `OTEL_EXPORTER_OTLP_ENDPOINT`,
/// or `None` when unset or the exporter cannot be built (the console
/// subscriber still installs either way).
fn otlp_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[aeroguard] OTLP exporter init failed: {e}"))
        .ok()?;

    // The request path is synchronous end to end, so spans are exported
    // inline; there is no runtime for a batch worker to live on.
    Some(
        SdkTracerProvider::builder()
            .with_resource(
                Resource::builder()
                    .with_service_name(service_name.to_string())
                    .build(),
            )
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_endpoint_means_no_provider() {
        // SAFETY: single-threaded test; no other thread reads this env-var.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(otlp_provider("aeroguard-test").is_none());
    }

    #[test]
    fn empty_guard_drops_quietly() {
        drop(TelemetryGuard { provider: None });
    }
}
