//! Access to pipeline run objects stored in the cluster.
//!
//! The admission logic only needs two calls: list every run in a namespace and
//! apply a JSON patch to one named run. [`ControlPlane`] is the seam between
//! that logic and the Kubernetes API so tests can substitute an in-memory
//! implementation.
//!
//! # Providers
//!
//! - [`KubeApiClient`] - Kubernetes REST API over `reqwest`

mod kube;

pub use kube::KubeApiClient;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Errors returned by control-plane calls.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// The call did not complete within its time bound.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (connection refused, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API server answered with a non-success status.
    #[error("API server returned {code}: {body}")]
    Status { code: u16, body: String },

    /// The response body could not be interpreted.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The client could not be constructed from its configuration.
    #[error("client configuration error: {0}")]
    Config(String),
}

/// One RFC 6902 JSON patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonPatchOp {
    pub op: &'static str,
    pub path: &'static str,
    pub value: Value,
}

impl JsonPatchOp {
    pub fn replace(path: &'static str, value: impl Into<Value>) -> Self {
        Self {
            op: "replace",
            path,
            value: value.into(),
        }
    }
}

/// Read and patch pipeline runs.
#[async_trait]
pub trait ControlPlane: Send + Sync + std::fmt::Debug {
    /// List all pipeline runs in `namespace` as untyped objects.
    async fn list_pipeline_runs(&self, namespace: &str) -> Result<Vec<Value>, ControlPlaneError>;

    /// Apply `patch` to the pipeline run `name` in `namespace`.
    ///
    /// The patch either applies in full or not at all.
    async fn patch_pipeline_run(
        &self,
        namespace: &str,
        name: &str,
        patch: &[JsonPatchOp],
    ) -> Result<(), ControlPlaneError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_op_serializes_as_json_patch() {
        let patch = vec![JsonPatchOp::replace("/spec/status", "PipelineRunCancelled")];
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{ "op": "replace", "path": "/spec/status", "value": "PipelineRunCancelled" }])
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ControlPlaneError::Status {
            code: 403,
            body: "forbidden".into(),
        };
        assert_eq!(err.to_string(), "API server returned 403: forbidden");
        assert!(
            ControlPlaneError::Timeout(Duration::from_secs(5))
                .to_string()
                .contains("5s")
        );
    }
}
