//! Defect records: invariant violations the engine detects on its own.
//!
//! A defect has no caller to return a typed failure to (the task was being
//! dropped, or a continuation was already running on some queue), so it is
//! described here as pure data and handed to the process-wide sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TaskError;
use super::ids::TaskId;
use super::state::StateSnapshot;

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefectKind {
    /// Dropped while a continuation was still waiting for completion.
    DiedWhileScheduled,

    /// Dropped while complete with an error nobody observed.
    UnhandledError,

    // The kinds below are guarded off by the one-shot admission flags and
    // are not expected to fire.

    /// A continuation tried to take the value of a task already handed off.
    ContinuedFromGarbage,

    /// A continuation ran before its task had completed.
    ContinuedBeforeCompletion,

    /// Scheduling passed the admission flag but found a continuation already
    /// in place.
    AlreadyScheduled,

    /// Completion passed the admission flag but found the task handed off.
    CompletedGarbage,

    /// The derived task of a continuation could not be completed.
    CompletionFailed { cause: TaskError },
}

/// A single report delivered to the defect sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    #[serde(flatten)]
    pub kind: DefectKind,
    pub message: String,
    pub task_id: TaskId,
    pub state: StateSnapshot,
    pub reported_at: DateTime<Utc>,
}

impl Defect {
    pub fn new(
        kind: DefectKind,
        task_id: TaskId,
        state: StateSnapshot,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            task_id,
            state,
            reported_at: Utc::now(),
        }
    }

    /// JSON form for telemetry pipelines.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "kind": "unserializable",
                "message": self.message,
                "error": e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_is_flat() {
        let id = TaskId::generate();
        let d = Defect::new(
            DefectKind::CompletionFailed {
                cause: TaskError::AlreadyCompleted,
            },
            id,
            StateSnapshot::CompleteDone,
            "could not complete",
        );

        let v = d.to_json();
        assert_eq!(v["kind"], "completion_failed");
        assert_eq!(v["cause"], "AlreadyCompleted");
        assert_eq!(v["message"], "could not complete");
        assert_eq!(v["state"]["phase"], "complete_done");
        assert_eq!(v["task_id"], serde_json::to_value(id).unwrap());
    }

    #[test]
    fn roundtrips_through_json() {
        let d = Defect::new(
            DefectKind::UnhandledError,
            TaskId::generate(),
            StateSnapshot::CompleteError {
                error: "lost".to_string(),
            },
            "error silently dropped",
        );
        let back: Defect = serde_json::from_value(d.to_json()).unwrap();
        assert_eq!(back, d);
    }
}
