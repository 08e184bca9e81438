//! Logging and optional OpenTelemetry export
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `forge=info,sdk_forge=info`)
//! - `FORGE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `FORGE_LOG_DIR`: additionally write daily-rotated JSON logs here
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: sdk-forge)

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "forge=info,forge_core=info,forge_infra_system=info,forge_api_http=info,sdk_forge=info";
const LOG_FILE_PREFIX: &str = "sdk-forge.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps background writers alive until shutdown
pub struct TelemetryGuard {
    _file_writer: Option<WorkerGuard>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        opentelemetry::global::shutdown_tracer_provider();
    }
}

/// Install the global subscriber
pub fn init() -> Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let log_format = std::env::var("FORGE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let mut layers: Vec<BoxedLayer> = Vec::new();

    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let mut file_writer = None;
    if let Ok(dir) = std::env::var("FORGE_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_writer(writer).boxed());
        file_writer = Some(guard);
    }

    let otel = otel_layer()?;
    let otel_enabled = otel.is_some();
    layers.extend(otel);

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    if otel_enabled {
        tracing::info!("OpenTelemetry export enabled");
    }

    Ok(TelemetryGuard {
        _file_writer: file_writer,
    })
}

/// OTLP layer, if an endpoint is configured
fn otel_layer() -> Result<Option<BoxedLayer>> {
    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_err() {
        return Ok(None);
    }

    #[cfg(feature = "telemetry")]
    {
        otel_layer_impl().map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        eprintln!(
            "OTEL_EXPORTER_OTLP_ENDPOINT is set but the 'telemetry' feature is not enabled; \
             rebuild with --features telemetry"
        );
        Ok(None)
    }
}

#[cfg(feature = "telemetry")]
fn otel_layer_impl() -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;
    use opentelemetry_sdk::Resource;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "sdk-forge".to_string());
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();

    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
