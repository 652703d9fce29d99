//! Admission handling for newly created pipeline runs.
//!
//! - [`review`]: the `AdmissionReview` envelope exchanged with the API server
//! - [`validator`]: the per-request decision logic

pub mod review;
pub mod validator;

pub use review::{AdmissionRequest, AdmissionResponse, AdmissionReview};
pub use validator::{AdmissionPolicy, AdmissionValidator};

/// Outcome of reviewing one admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Human-readable detail surfaced in the admission response.
    pub message: Option<String>,
}

impl Decision {
    /// Allow without a message.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    pub fn allow_with(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: Some(message.into()),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }

    /// Stable label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match (self.allowed, self.message.is_some()) {
            (false, _) => "denied",
            (true, false) => "skipped",
            (true, true) => "allowed",
        }
    }
}
