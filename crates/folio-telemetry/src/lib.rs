//! Tracing setup for Folio binaries.
//!
//! [`init_tracing`] installs a `tracing` subscriber that logs to stderr,
//! filtered by `RUST_LOG` (default `info`). With the `telemetry` feature,
//! spans are also exported over OTLP when the standard OTel environment
//! variables ask for it:
//!
//! ```bash
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 \
//!     cargo run -p folio-replay --features telemetry -- script.ron
//! ```
//!
//! Set `OTEL_SDK_DISABLED=true` to explicitly disable even when the endpoint is set.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{OtelGuard, otel_layer};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps exporters alive; spans are flushed when it drops.
#[derive(Default)]
#[must_use = "dropping the guard shuts down span export"]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    _otel: Option<OtelGuard>,
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init_tracing(service_name: &str) -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "telemetry")]
    if otel_enabled() {
        return match otel_layer(service_name) {
            Ok((layer, guard)) => {
                let _ = registry.with(layer).try_init();
                TelemetryGuard { _otel: Some(guard) }
            }
            Err(e) => {
                let _ = registry.try_init();
                tracing::warn!(error = %e, "OTLP export disabled");
                TelemetryGuard::default()
            }
        };
    }

    if registry.try_init().is_ok() {
        tracing::debug!(service = service_name, "tracing initialized");
    }
    TelemetryGuard::default()
}

/// Check whether OTel export should be enabled.
///
/// Returns `true` when standard OTel env vars indicate export is desired:
/// - `OTEL_SDK_DISABLED` is NOT set to `"true"`
/// - AND at least one of:
///   - `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///   - `OTEL_TRACES_EXPORTER` is set (and not `"none"`)
pub fn otel_enabled() -> bool {
    if std::env::var("OTEL_SDK_DISABLED")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return false;
    }

    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        return true;
    }

    if let Ok(exporter) = std::env::var("OTEL_TRACES_EXPORTER") {
        return !exporter.eq_ignore_ascii_case("none");
    }

    false
}

/// Sampling rate for a span, by name prefix.
///
/// | Prefix         | Rate | Rationale                               |
/// |----------------|------|-----------------------------------------|
/// | `save.*`       | 100% | Every persistence call matters          |
/// | `lifecycle.*`  | 100% | Create/close/switch are rare            |
/// | `graph.*`      | 10%  | One merge per save                      |
/// | `focus.*`      |  1%  | Every navigation keystroke              |
/// | other          | 10%  | Default for unclassified spans          |
pub fn sampling_rate(span_name: &str) -> f64 {
    if span_name.starts_with("save") || span_name.starts_with("lifecycle") {
        1.0
    } else if span_name.starts_with("focus") {
        0.01
    } else {
        0.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_rates_by_prefix() {
        assert_eq!(sampling_rate("save.run"), 1.0);
        assert_eq!(sampling_rate("lifecycle.close"), 1.0);
        assert_eq!(sampling_rate("graph.upsert"), 0.1);
        assert_eq!(sampling_rate("focus.handle_key"), 0.01);
        assert_eq!(sampling_rate("anything"), 0.1);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _a = init_tracing("folio-test");
        let _b = init_tracing("folio-test");
    }
}
