use std::borrow::Cow;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogFormat;

type OtelLayer<S> = tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>;

/// Flushes the global tracer provider on drop.
pub struct OtelGuard {
    _private: (),
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

struct ErrorCounterLayer;

impl<S> Layer<S> for ErrorCounterLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            metrics::counter!("tracing_error_events").increment(1);
        }
    }
}

/// Builds the OTLP layer when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
/// Returns `None` (logs and metrics only) when unset or when the exporter
/// cannot be built.
fn otel_layer<S>(service_name: Cow<'static, str>) -> Option<(OtelLayer<S>, OtelGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .ok()?;

    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]);

    // Batch export needs a Tokio runtime; the profiler binary is `#[tokio::main]`.
    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("onchain_profiler");
    let _ = opentelemetry::global::set_tracer_provider(provider);

    Some((
        tracing_opentelemetry::layer().with_tracer(tracer),
        OtelGuard { _private: () },
    ))
}

/// Build a `tracing` dispatcher configured for:
/// - JSON (or pretty) logs to stdout
/// - EnvFilter that respects `RUST_LOG` and falls back to `default_level`
/// - `tracing_error_events` counter for ERROR events
/// - Optional OpenTelemetry OTLP trace export when `OTEL_EXPORTER_OTLP_ENDPOINT` is set
pub fn build_dispatch(
    service_name: impl Into<Cow<'static, str>>,
    default_level: &str,
    format: LogFormat,
) -> (tracing::Dispatch, Option<OtelGuard>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (otel, guard) = match otel_layer(service_name.into()) {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    // Each format is its own layer; the unused one is `None`.
    let (json, pretty) = match format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_timer(tracing_subscriber::fmt::time::SystemTime)
                    .json(),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(tracing_subscriber::fmt::layer().with_target(true).pretty()),
        ),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .with(ErrorCounterLayer)
        .with(otel);

    (tracing::Dispatch::new(subscriber), guard)
}
