//! Per-request admission decision.
//!
//! A new run is never rejected by default: the only effect of admission is
//! cancelling older active runs of the same pipeline. Rejection when siblings
//! were cancelled is available behind
//! [`AdmissionPolicy::enforce_cancellation_blocks_admission`].

use super::{AdmissionRequest, Decision};
use crate::cancellation::RunCanceller;
use crate::pipeline_run;
use serde::Deserialize;

/// Admission policy knobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdmissionPolicy {
    /// Deny the incoming run when at least one sibling run was cancelled.
    #[serde(default)]
    pub enforce_cancellation_blocks_admission: bool,
}

/// Reviews pipeline run creation requests.
#[derive(Debug, Clone)]
pub struct AdmissionValidator {
    canceller: RunCanceller,
    policy: AdmissionPolicy,
}

impl AdmissionValidator {
    pub fn new(canceller: RunCanceller, policy: AdmissionPolicy) -> Self {
        Self { canceller, policy }
    }

    /// Decide on one admission request, cancelling sibling runs on the way.
    pub async fn validate(&self, request: &AdmissionRequest) -> Decision {
        let namespace = request.namespace.as_str();
        if namespace.is_empty() {
            tracing::info!(uid = %request.uid, "could not get namespace, skipping checks");
            return Decision::allow();
        }

        let run = request
            .object
            .as_ref()
            .map(pipeline_run::decode)
            .unwrap_or_default();
        let pipeline_ref = run.pipeline_ref_name();
        if pipeline_ref.is_empty() {
            tracing::info!(
                uid = %request.uid,
                namespace = %namespace,
                "could not get pipelineRef name, skipping checks"
            );
            return Decision::allow();
        }

        tracing::info!(
            name: "admission.review",
            uid = %request.uid,
            namespace = %namespace,
            pipelinerun = %display_name(request, &run),
            pipeline_ref = %pipeline_ref,
            "reviewing pipelinerun creation"
        );

        match self.canceller.cancel_active_runs(namespace, pipeline_ref).await {
            Ok(count) => {
                let message = format!("Cancelled {count} pipelinerun(s)");
                if self.policy.enforce_cancellation_blocks_admission && count > 0 {
                    Decision::deny(message)
                } else {
                    Decision::allow_with(message)
                }
            }
            Err(e) => {
                tracing::error!(
                    name: "admission.cancel_failed",
                    namespace = %namespace,
                    pipeline_ref = %pipeline_ref,
                    error = %e,
                    "could not cancel active runs"
                );
                Decision::allow_with(format!(
                    "Encountered error while trying to cancel active runs: {e}"
                ))
            }
        }
    }
}

/// Name for logging; new runs usually only carry `generateName`.
fn display_name<'a>(request: &'a AdmissionRequest, run: &'a pipeline_run::PipelineRun) -> &'a str {
    [request.name.as_str(), run.name.as_str(), run.generate_name.as_str()]
        .into_iter()
        .find(|n| !n.is_empty())
        .unwrap_or("<unnamed>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::DEFAULT_CALL_TIMEOUT;
    use crate::cancellation::tests::{FakeControlPlane, run};
    use crate::control_plane::ControlPlane;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn validator(fake: &Arc<FakeControlPlane>, enforce: bool) -> AdmissionValidator {
        AdmissionValidator::new(
            RunCanceller::new(Arc::clone(fake) as Arc<dyn ControlPlane>, DEFAULT_CALL_TIMEOUT),
            AdmissionPolicy {
                enforce_cancellation_blocks_admission: enforce,
            },
        )
    }

    fn request(namespace: &str, object: Value) -> AdmissionRequest {
        AdmissionRequest {
            uid: "uid-1".into(),
            namespace: namespace.into(),
            operation: "CREATE".into(),
            object: Some(object),
            ..AdmissionRequest::default()
        }
    }

    fn new_run(pipeline: &str) -> Value {
        json!({
            "metadata": { "generateName": "build-" },
            "spec": { "pipelineRef": { "name": pipeline } }
        })
    }

    #[tokio::test]
    async fn test_empty_namespace_allows_silently() {
        let fake = Arc::new(FakeControlPlane::default());
        let decision = validator(&fake, false)
            .validate(&request("", new_run("build-pipeline")))
            .await;
        assert_eq!(decision, Decision::allow());
        assert_eq!(fake.list_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_pipeline_ref_allows_silently() {
        let fake = Arc::new(FakeControlPlane::with_runs(vec![run(
            "a",
            "build-pipeline",
            Some("Unknown"),
            "",
        )]));
        let v = validator(&fake, false);

        for object in [json!({ "spec": {} }), json!({ "spec": { "pipelineRef": {} } })] {
            let decision = v.validate(&request("ns1", object)).await;
            assert_eq!(decision, Decision::allow());
        }
        let decision = v
            .validate(&AdmissionRequest {
                namespace: "ns1".into(),
                ..AdmissionRequest::default()
            })
            .await;
        assert_eq!(decision, Decision::allow());

        assert_eq!(fake.list_count(), 0);
        assert!(fake.patched_names().is_empty());
    }

    #[tokio::test]
    async fn test_non_object_payload_allows_silently() {
        let fake = Arc::new(FakeControlPlane::default());
        let v = validator(&fake, false);

        for object in [json!("build-pipeline"), json!([1, 2]), Value::Null] {
            assert_eq!(v.validate(&request("ns1", object)).await, Decision::allow());
        }
        assert_eq!(fake.list_count(), 0);
    }

    #[tokio::test]
    async fn test_reports_cancelled_count() {
        let mut fake = FakeControlPlane::with_runs(vec![
            run("r1", "build-pipeline", Some("Unknown"), ""),
            run("r2", "build-pipeline", Some("Unknown"), ""),
            run("r3", "build-pipeline", Some("Unknown"), ""),
        ]);
        fake.fail_patch_for.insert("r3".to_string());
        let fake = Arc::new(fake);

        let decision = validator(&fake, false)
            .validate(&request("ns1", new_run("build-pipeline")))
            .await;

        assert!(decision.allowed);
        assert_eq!(decision.message.as_deref(), Some("Cancelled 2 pipelinerun(s)"));
        assert_eq!(fake.list_calls.lock().unwrap().as_slice(), ["ns1".to_string()]);
    }

    #[tokio::test]
    async fn test_list_error_still_allows() {
        let fake = Arc::new(FakeControlPlane {
            fail_list: true,
            ..FakeControlPlane::default()
        });

        let decision = validator(&fake, true)
            .validate(&request("ns1", new_run("build-pipeline")))
            .await;

        assert!(decision.allowed);
        let message = decision.message.unwrap();
        assert!(message.starts_with("Encountered error while trying to cancel active runs:"));
        assert!(message.contains("403"));
    }

    #[tokio::test]
    async fn test_enforcement_denies_only_when_something_was_cancelled() {
        let fake = Arc::new(FakeControlPlane::with_runs(vec![run(
            "r1",
            "build-pipeline",
            Some("Unknown"),
            "",
        )]));
        let v = validator(&fake, true);

        let decision = v.validate(&request("ns1", new_run("build-pipeline"))).await;
        assert_eq!(decision, Decision::deny("Cancelled 1 pipelinerun(s)"));

        let decision = v.validate(&request("ns1", new_run("deploy-pipeline"))).await;
        assert_eq!(decision, Decision::allow_with("Cancelled 0 pipelinerun(s)"));
    }

    #[test]
    fn test_display_name_prefers_request_name() {
        let run = pipeline_run::PipelineRun {
            generate_name: "build-".into(),
            ..Default::default()
        };
        let mut req = AdmissionRequest::default();
        assert_eq!(display_name(&req, &run), "build-");
        req.name = "build-abc".into();
        assert_eq!(display_name(&req, &run), "build-abc");
    }
}
