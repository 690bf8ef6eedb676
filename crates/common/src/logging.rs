//! Provides utilities to initialize logging and OpenTelemetry tracing.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable holding the OTLP collector endpoint.
pub const OTLP_URL_ENVVAR: &str = "TBTC_RELAYER_OTLP_URL";

/// Environment variable name for the service label, which is appended to the whoami string.
pub const SVC_LABEL_ENVVAR: &str = "TBTC_RELAYER_SVC_LABEL";

/// The line format of stdout logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,

    /// One JSON object per line, for log shippers.
    Json,
}

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies this relayer instance in logs and exported spans.
    whoami: String,

    /// The OpenTelemetry URL for exporting traces.
    otel_url: Option<String>,

    format: LogFormat,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set and every optional output disabled.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
            format: LogFormat::Compact,
        }
    }

    /// Creates a new instance whose whoami string is derived from `base` and the service label
    /// envvar.
    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    /// Sets the opentelemetry URL to the provided string.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    /// Sets the stdout line format.
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the whoami string.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(tbtc-relayer)")
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// Calling this more than once is harmless: later calls leave the first subscriber in place,
/// which lets tests initialize logging unconditionally.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    let log_file = env::var("LOG_FILE").is_ok_and(|v| v == "1");
    let log_line_num = env::var("LOG_LINE_NUM").is_ok_and(|v| v == "1");

    let stdout_sub = match config.format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_file(log_file)
            .with_line_number(log_line_num)
            .with_filter(filt)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_file(log_file)
            .with_line_number(log_line_num)
            .with_filter(filt)
            .boxed(),
    };

    let otel_sub = config.otel_url.as_ref().and_then(|otel_url| {
        let exporter = match opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otel_url)
            .build()
        {
            Ok(exporter) => exporter,
            Err(err) => {
                // stdout is not up yet, so this is the only place the failure can go
                eprintln!("failed to build OTLP exporter for {otel_url}: {err}");
                return None;
            }
        };

        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
            .build();

        let tp = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();

        let tracer = tp.tracer("tbtc-relayer");

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    });

    let initialized = tracing_subscriber::registry()
        .with(stdout_sub)
        .with(otel_sub)
        .try_init()
        .is_ok();

    if initialized {
        info!(whoami = %config.whoami, format = ?config.format, "logging started");
    }
}

/// Gets the OTLP URL from the standard envvar.
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from the standard envvar, which should be included in the whoami
/// string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
