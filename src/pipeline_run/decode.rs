//! Best-effort projection of an untyped pipeline run object.
//!
//! Objects come straight from the API server (or from an admission request
//! that has not been defaulted yet), so any field may be missing or carry an
//! unexpected shape. Decoding never fails: a field that cannot be read falls
//! back to its zero value, which in turn makes the run ineligible for
//! cancellation.

use serde_json::Value;

use super::{Condition, ConditionStatus, PipelineRef, PipelineRun};

/// Decode a pipeline run from its JSON representation.
pub fn decode(object: &Value) -> PipelineRun {
    let metadata = object.get("metadata");
    let spec = object.get("spec");

    PipelineRun {
        name: string_at(metadata, "name"),
        generate_name: string_at(metadata, "generateName"),
        pipeline_ref: spec
            .and_then(|s| s.get("pipelineRef"))
            .filter(|r| r.is_object())
            .map(|r| PipelineRef {
                name: string_at(Some(r), "name"),
            }),
        requested_status: string_at(spec, "status"),
        conditions: decode_conditions(object),
    }
}

fn decode_conditions(object: &Value) -> Vec<Condition> {
    let Some(items) = object
        .get("status")
        .and_then(|s| s.get("conditions"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|c| c.is_object())
        .map(|c| {
            let c = Some(c);
            Condition {
                type_: string_at(c, "type"),
                status: ConditionStatus::parse(&string_at(c, "status")),
                severity: string_at(c, "severity"),
                reason: string_at(c, "reason"),
                message: string_at(c, "message"),
            }
        })
        .collect()
}

fn string_at(parent: Option<&Value>, key: &str) -> String {
    parent
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
