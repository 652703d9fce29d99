use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::admission::{AdmissionPolicy, AdmissionReview, AdmissionValidator};
use crate::cancellation::RunCanceller;
use crate::config::AppConfig;
use crate::control_plane::{ControlPlane, KubeApiClient};
use crate::telemetry;

/// Admission requests carry a whole object; Kubernetes caps objects well below this.
const MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Start the webhook server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let client: Arc<dyn ControlPlane> = Arc::new(KubeApiClient::new(
        &config.control_plane,
        config.pipeline_runs.clone(),
    )?);

    info!(
        name: "control_plane.configured",
        api_url = %config.control_plane.api_url,
        call_timeout_secs = config.control_plane.call_timeout_secs,
        "Kubernetes API client configured"
    );

    let metrics = telemetry::install_metrics();
    let state = AppState::new(client, &config, metrics);

    let app = router(state, Duration::from_secs(config.server.request_timeout_secs));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        enforce = config.admission.enforce_cancellation_blocks_admission,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

impl AppState {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        config: &AppConfig,
        metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
    ) -> Self {
        let canceller = RunCanceller::new(
            client,
            Duration::from_secs(config.control_plane.call_timeout_secs),
        );
        Self::with_validator(
            AdmissionValidator::new(canceller, config.admission.clone()),
            metrics,
        )
    }

    pub fn with_validator(
        validator: AdmissionValidator,
        metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
    ) -> Self {
        Self {
            validator: Arc::new(validator),
            metrics,
        }
    }

    /// State with the default policy, used by tests and local tooling.
    pub fn from_control_plane(client: Arc<dyn ControlPlane>, call_timeout: Duration) -> Self {
        Self::with_validator(
            AdmissionValidator::new(
                RunCanceller::new(client, call_timeout),
                AdmissionPolicy::default(),
            ),
            None,
        )
    }
}

/// Build the HTTP router.
///
/// `request_timeout` bounds the health and metrics endpoints only. Admission
/// routes are bounded by the per-call control-plane timeout instead: cutting a
/// review short would answer the API server without an `AdmissionReview`, and
/// a non-2xx webhook reply rejects the run under `failurePolicy: Fail`.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let admission = Router::new()
        .route("/validate", post(validate_handler))
        // Aggregated-API style path, e.g. /apis/admission.example.com/v1beta1/pipelinerunrestrictions
        .route("/apis/{group}/{version}/{resource}", post(validate_handler));

    let operational = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(request_timeout, next.run(req)).await {
                    Ok(res) => res,
                    Err(_elapsed) => {
                        (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                    }
                }
            },
        ));

    admission
        .merge(operational)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /validate - review a pipeline run creation.
async fn validate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AdmissionReview>, (StatusCode, String)> {
    let review: AdmissionReview = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed AdmissionReview");
        (StatusCode::BAD_REQUEST, format!("invalid AdmissionReview: {e}"))
    })?;

    let Some(request) = review.request.as_ref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            "AdmissionReview has no request".to_string(),
        ));
    };

    let decision = state.validator.validate(request).await;

    metrics::counter!("pipeline_restrictor_admissions_total", "outcome" => decision.outcome())
        .increment(1);
    tracing::info!(
        name: "admission.decision",
        uid = %request.uid,
        namespace = %request.namespace,
        allowed = decision.allowed,
        message = decision.message.as_deref().unwrap_or(""),
        "Admission decision"
    );

    Ok(Json(review.respond(decision)))
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}

/// GET /metrics - Prometheus exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
