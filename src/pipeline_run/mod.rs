//! Tekton `PipelineRun` state model.
//!
//! Only the handful of fields needed to decide whether a run is still active
//! are modelled. Values are built from a fresh control-plane snapshot on every
//! admission and are never cached, so every predicate here is a pure function
//! of the decoded fields.

pub mod decode;

pub use decode::decode;

/// Condition type Tekton uses to report completion of a run.
pub const SUCCEEDED_CONDITION: &str = "Succeeded";

/// Value of `spec.status` that asks Tekton to cancel a run.
pub const CANCELLED_SENTINEL: &str = "PipelineRunCancelled";

/// Group/version/resource coordinates of pipeline runs on the API server.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PipelineRunResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Default for PipelineRunResource {
    fn default() -> Self {
        Self {
            group: "tekton.dev".to_string(),
            version: "v1beta1".to_string(),
            resource: "pipelineruns".to_string(),
        }
    }
}

impl PipelineRunResource {
    /// Collection path for a namespace, e.g.
    /// `/apis/tekton.dev/v1beta1/namespaces/ns1/pipelineruns`.
    pub fn collection_path(&self, namespace: &str) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.group, self.version, namespace, self.resource
        )
    }

    /// Path of a single named object in a namespace.
    pub fn object_path(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}", self.collection_path(namespace), name)
    }
}

/// Reference from a run to the pipeline definition it executes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineRef {
    pub name: String,
}

/// Tri-state status of a condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    /// Anything else, including an absent value.
    #[default]
    Other,
}

impl ConditionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "True" => Self::True,
            "False" => Self::False,
            "Unknown" => Self::Unknown,
            _ => Self::Other,
        }
    }
}

/// One lifecycle observation from `status.conditions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    pub type_: String,
    pub status: ConditionStatus,
    pub severity: String,
    pub reason: String,
    pub message: String,
}

impl Condition {
    pub fn is_unknown(&self) -> bool {
        self.status == ConditionStatus::Unknown
    }
}

/// A single execution of a pipeline, as far as cancellation cares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineRun {
    /// May be empty while the API server is still assigning one.
    pub name: String,
    pub generate_name: String,
    pub pipeline_ref: Option<PipelineRef>,
    /// Raw `spec.status`, used to request lifecycle transitions.
    pub requested_status: String,
    pub conditions: Vec<Condition>,
}

impl PipelineRun {
    /// Name of the referenced pipeline, empty when there is none.
    pub fn pipeline_ref_name(&self) -> &str {
        self.pipeline_ref.as_ref().map_or("", |r| r.name.as_str())
    }

    /// First condition with the given type.
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// A run is active only while its `Succeeded` condition is `Unknown`.
    ///
    /// Runs without a `Succeeded` condition count as done so that objects we
    /// know nothing about are never cancelled.
    pub fn is_done(&self) -> bool {
        self.condition(SUCCEEDED_CONDITION)
            .is_none_or(|c| !c.is_unknown())
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested_status == CANCELLED_SENTINEL
    }

    /// Whether this run should be cancelled on admission of another run
    /// referencing `pipeline_ref`.
    pub fn is_cancellation_candidate(&self, pipeline_ref: &str) -> bool {
        !pipeline_ref.is_empty()
            && self.pipeline_ref_name() == pipeline_ref
            && !self.name.is_empty()
            && !self.is_done()
            && !self.is_cancelled()
    }
}
