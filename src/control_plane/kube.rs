//! Kubernetes API server provider.
//!
//! Talks to the API server's REST endpoints directly. In-cluster defaults use
//! the pod's service-account token and CA bundle; both are optional so the
//! client also works against `kubectl proxy`.

use super::{ControlPlane, ControlPlaneError, JsonPatchOp};
use crate::config::ControlPlaneConfig;
use crate::pipeline_run::PipelineRunResource;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::path::{Path, PathBuf};

const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// Control plane backed by the Kubernetes REST API.
#[derive(Debug)]
pub struct KubeApiClient {
    client: reqwest::Client,
    api_url: String,
    token_file: Option<PathBuf>,
    resource: PipelineRunResource,
}

impl KubeApiClient {
    /// Build a client from configuration.
    ///
    /// A configured CA file that does not exist is ignored so the same
    /// defaults work both in-cluster and against a local proxy.
    pub fn new(
        config: &ControlPlaneConfig,
        resource: PipelineRunResource,
    ) -> Result<Self, ControlPlaneError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(config.insecure_skip_tls_verify);

        if let Some(ca_file) = config.ca_file.as_deref().map(Path::new) {
            if ca_file.exists() {
                let pem = std::fs::read(ca_file).map_err(|e| {
                    ControlPlaneError::Config(format!("reading {}: {e}", ca_file.display()))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| ControlPlaneError::Config(e.to_string()))?;
                builder = builder.add_root_certificate(cert);
            } else {
                tracing::debug!(path = %ca_file.display(), "CA file not found, using system roots");
            }
        }

        let client = builder
            .build()
            .map_err(|e| ControlPlaneError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token_file: config.token_file.as_ref().map(PathBuf::from),
            resource,
        })
    }

    fn collection_url(&self, namespace: &str) -> String {
        format!("{}{}", self.api_url, self.resource.collection_path(namespace))
    }

    fn object_url(&self, namespace: &str, name: &str) -> String {
        format!("{}{}", self.api_url, self.resource.object_path(namespace, name))
    }

    /// The token is re-read on every call because projected service-account
    /// tokens are rotated on disk.
    async fn bearer_token(&self) -> Option<String> {
        let path = self.token_file.as_ref()?;
        match tokio::fs::read_to_string(path).await {
            Ok(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no service account token");
                None
            }
        }
    }

    async fn send(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ControlPlaneError> {
        if let Some(token) = self.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ControlPlaneError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ControlPlane for KubeApiClient {
    async fn list_pipeline_runs(&self, namespace: &str) -> Result<Vec<Value>, ControlPlaneError> {
        let request = self
            .client
            .get(self.collection_url(namespace))
            .header(ACCEPT, "application/json");
        let body: Value = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))?;

        items_of(body)
    }

    async fn patch_pipeline_run(
        &self,
        namespace: &str,
        name: &str,
        patch: &[JsonPatchOp],
    ) -> Result<(), ControlPlaneError> {
        let payload =
            serde_json::to_vec(patch).map_err(|e| ControlPlaneError::Decode(e.to_string()))?;
        let request = self
            .client
            .patch(self.object_url(namespace, name))
            .header(CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .body(payload);

        self.send(request).await?;
        Ok(())
    }
}

/// Extract `items` from a list response. A `null` item list is empty.
fn items_of(body: Value) -> Result<Vec<Value>, ControlPlaneError> {
    let Value::Object(mut list) = body else {
        return Err(ControlPlaneError::Decode(
            "list response is not an object".to_string(),
        ));
    };
    match list.remove("items") {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(ControlPlaneError::Decode("items is not an array".to_string())),
    }
}
