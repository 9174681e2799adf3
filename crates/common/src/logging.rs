//! Tracing setup shared by the staking node and its tests.
//!
//! Everything goes through a single [`tracing_subscriber`] registry: a compact stdout layer that
//! honours `RUST_LOG`, and an optional OTLP exporter layer when a collector URL is configured.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding the OTLP collector URL.
pub const OTLP_URL_ENVVAR: &str = "STAKING_OTLP_URL";

/// Environment variable holding a label that is appended to the whoami string.
pub const SVC_LABEL_ENVVAR: &str = "STAKING_SERVICE_LABEL";

/// Directive used when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVE: &str = "info";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies the process in logs and exported traces.
    whoami: String,

    /// The OpenTelemetry collector URL, if traces should be exported.
    otel_url: Option<String>,
}

impl LoggerConfig {
    /// Creates a config that only logs to stdout.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
        }
    }

    /// Creates a config whose whoami is `base` plus the service label from the environment.
    pub fn with_base_name(base: &str) -> Self {
        Self::new(get_whoami_string(base))
    }

    /// Creates a config from the standard environment variables.
    pub fn from_env(base: &str) -> Self {
        let mut config = Self::with_base_name(base);
        if let Some(url) = get_otlp_url_from_env() {
            config.set_otlp_url(url);
        }

        config
    }

    /// Enables exporting traces to the given OTLP collector.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    /// Returns the whoami string.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(btc-staking)")
    }
}

/// Initializes the global subscriber.
///
/// Only the first call in a process installs a subscriber; later calls are no-ops so that every
/// test can call this without coordinating with the others.
pub fn init(config: LoggerConfig) {
    let filt = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let log_file = env::var("LOG_FILE").is_ok_and(|v| v == "1");
    let log_line_num = env::var("LOG_LINE_NUM").is_ok_and(|v| v == "1");

    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(log_file)
                .with_line_number(log_line_num),
        )
        .with_filter(filt);

    let installed = match &config.otel_url {
        Some(otel_url) => {
            let resource = Resource::builder()
                .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
                .build();

            let exporter = match opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(otel_url)
                .build()
            {
                Ok(exporter) => exporter,
                Err(err) => {
                    // fall back to stdout so a bad collector URL never takes the node down
                    let ok = tracing_subscriber::registry()
                        .with(stdout_sub)
                        .try_init()
                        .is_ok();
                    if ok {
                        warn!(%otel_url, %err, "could not build otlp exporter, logging to stdout only");
                    }
                    return;
                }
            };

            let tp = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                .with_resource(resource)
                .with_batch_exporter(exporter)
                .build();

            let tracer = tp.tracer("btc-staking");
            let otel_sub = tracing_opentelemetry::layer().with_tracer(tracer);

            tracing_subscriber::registry()
                .with(stdout_sub)
                .with(otel_sub)
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::registry()
            .with(stdout_sub)
            .try_init()
            .is_ok(),
    };

    if installed {
        info!(whoami = %config.whoami, "logging started");
    }
}

/// Gets the OTLP URL from [`OTLP_URL_ENVVAR`].
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from [`SVC_LABEL_ENVVAR`].
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes the whoami string: `base`, suffixed with `%label` when a service label is set.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
