use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging.
///
/// - `EnvFilter` for dynamic log levels (`RUST_LOG`).
/// - `LOG_FORMAT=json` switches to JSON lines for log shippers.
pub fn init() {
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pipeline_restrictor=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter_layer);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Install the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed (e.g. in tests).
pub fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!(
        "pipeline_restrictor_admissions_total",
        "Admission reviews handled, by outcome"
    );
    metrics::describe_counter!(
        "pipeline_restrictor_cancellations_total",
        "Pipeline run cancellation attempts, by result"
    );
    metrics::describe_counter!(
        "pipeline_restrictor_list_failures_total",
        "Failed attempts to list pipeline runs"
    );
}
