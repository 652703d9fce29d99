//! Minimal `AdmissionReview` envelope.
//!
//! Only the fields the webhook reads or writes are modelled; unknown fields in
//! the incoming review are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Decision;

pub const DEFAULT_API_VERSION: &str = "admission.k8s.io/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub operation: String,
    /// The object being admitted, as sent by the API server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
}

/// Subset of `metav1.Status` shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub message: String,
}

impl AdmissionReview {
    /// Build the reply to this review, echoing its `apiVersion` and `kind`
    /// and the request `uid`.
    pub fn respond(&self, decision: Decision) -> AdmissionReview {
        let uid = self
            .request
            .as_ref()
            .map(|r| r.uid.clone())
            .unwrap_or_default();

        AdmissionReview {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            request: None,
            response: Some(AdmissionResponse {
                uid,
                allowed: decision.allowed,
                status: decision.message.map(|message| ResponseStatus { message }),
            }),
        }
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_kind() -> String {
    "AdmissionReview".to_string()
}
