//! # OpenTelemetry Metrics
//!
//! Metrics collection for the data-access layer, exported via OTLP to the
//! configured observability backend. Instrument handles live in
//! [`data_access`]; this module owns the one-time meter-provider setup.
//!
//! When telemetry is disabled the provider is never installed and every
//! instrument records against the no-op global meter, so the data path pays
//! nothing.

use std::sync::OnceLock;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{reader::DefaultTemporalitySelector, PeriodicReader, SdkMeterProvider},
    runtime, Resource,
};

use crate::config::TelemetrySettings;

pub mod data_access;

/// Global metrics initialization state
static METRICS_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Build the OTLP-backed meter provider.
fn build_meter_provider(
    settings: &TelemetrySettings,
) -> Result<SdkMeterProvider, Box<dyn std::error::Error>> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", settings.service_name.clone()),
        KeyValue::new(
            "deployment.environment",
            settings.deployment_environment.clone(),
        ),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&settings.otlp_endpoint)
        .build_metrics_exporter(Box::new(DefaultTemporalitySelector::new()))?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(Duration::from_secs(settings.export_interval_seconds))
        .build();

    let meter_provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    Ok(meter_provider)
}

/// Install the global meter provider. Safe to call multiple times;
/// subsequent calls are no-ops. Failure to reach the OTLP endpoint is
/// logged and metrics stay on the no-op meter rather than failing startup.
pub fn init_metrics(settings: &TelemetrySettings) {
    METRICS_INITIALIZED.get_or_init(|| {
        match build_meter_provider(settings) {
            Ok(meter_provider) => {
                opentelemetry::global::set_meter_provider(meter_provider);
                data_access::init();

                tracing::info!(
                    service_name = %settings.service_name,
                    otlp_endpoint = %settings.otlp_endpoint,
                    export_interval_seconds = settings.export_interval_seconds,
                    "OpenTelemetry metrics initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to initialize OpenTelemetry metrics - metrics collection disabled"
                );
            }
        }
    });
}
