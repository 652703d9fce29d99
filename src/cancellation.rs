//! Cancellation of active pipeline runs that share a pipeline reference.

use crate::control_plane::{ControlPlane, ControlPlaneError, JsonPatchOp};
use crate::pipeline_run::{self, CANCELLED_SENTINEL};
use std::sync::Arc;
use std::time::Duration;

/// Default bound for a single list or patch call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from [`RunCanceller::cancel_active_runs`].
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("called with empty pipelineRef")]
    InvalidArgument,

    #[error("error getting pipelineruns: {0}")]
    List(#[source] ControlPlaneError),
}

/// Cancels every active run of a pipeline in a namespace.
///
/// Cancellation is best effort: a failed patch is logged and skipped, and
/// nothing is rolled back. Re-issuing a cancel on an already cancelled run is
/// harmless, so a missed run is picked up on the next admission.
#[derive(Debug, Clone)]
pub struct RunCanceller {
    client: Arc<dyn ControlPlane>,
    call_timeout: Duration,
}

impl RunCanceller {
    pub fn new(client: Arc<dyn ControlPlane>, call_timeout: Duration) -> Self {
        Self {
            client,
            call_timeout,
        }
    }

    /// Cancel all active runs in `namespace` referencing `pipeline_ref`.
    ///
    /// Returns how many runs were successfully patched. Only a failed list
    /// call fails the whole operation.
    pub async fn cancel_active_runs(
        &self,
        namespace: &str,
        pipeline_ref: &str,
    ) -> Result<usize, CancelError> {
        if pipeline_ref.is_empty() {
            return Err(CancelError::InvalidArgument);
        }

        let items = self
            .bounded(self.client.list_pipeline_runs(namespace))
            .await
            .map_err(|e| {
                metrics::counter!("pipeline_restrictor_list_failures_total").increment(1);
                CancelError::List(e)
            })?;

        let patch = [JsonPatchOp::replace("/spec/status", CANCELLED_SENTINEL)];
        let mut cancelled = 0;

        for run in items.iter().map(pipeline_run::decode) {
            if !run.is_cancellation_candidate(pipeline_ref) {
                continue;
            }

            match self
                .bounded(self.client.patch_pipeline_run(namespace, &run.name, &patch))
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        name: "pipelinerun.cancelled",
                        namespace = %namespace,
                        pipelinerun = %run.name,
                        pipeline_ref = %pipeline_ref,
                        "successfully cancelled pipelinerun"
                    );
                    metrics::counter!("pipeline_restrictor_cancellations_total", "result" => "success")
                        .increment(1);
                    cancelled += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        name: "pipelinerun.cancel_failed",
                        namespace = %namespace,
                        pipelinerun = %run.name,
                        error = %e,
                        "error cancelling pipelinerun"
                    );
                    metrics::counter!("pipeline_restrictor_cancellations_total", "result" => "failure")
                        .increment(1);
                }
            }
        }

        Ok(cancelled)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ControlPlaneError>>,
    ) -> Result<T, ControlPlaneError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_elapsed| ControlPlaneError::Timeout(self.call_timeout))?
    }
}
