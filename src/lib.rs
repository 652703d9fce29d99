//! Pipeline Restrictor
//!
//! A Kubernetes validating admission webhook for Tekton `PipelineRun`s. When a
//! new run is created, every other active run in the same namespace that
//! references the same pipeline is cancelled, so at most one execution per
//! pipeline stays active. The new run itself is allowed.
//!
//! # Modules
//!
//! - [`pipeline_run`]: run state model and best-effort decoder
//! - [`control_plane`]: list/patch access to runs on the API server
//! - [`cancellation`]: selection and cancellation of sibling runs
//! - [`admission`]: `AdmissionReview` envelope and decision logic
//! - [`server`]: Axum HTTP server

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod admission;
pub mod cancellation;
pub mod config;
pub mod control_plane;
pub mod pipeline_run;
pub mod server;
pub mod telemetry;

use admission::AdmissionValidator;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Admission decision engine.
    pub validator: Arc<AdmissionValidator>,
    /// Prometheus exporter handle, absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}
