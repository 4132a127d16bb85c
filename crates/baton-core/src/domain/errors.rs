//! Errors - 制御フローのエラー型
//!
//! 二つの分類を混ぜないこと:
//! - [`TaskError`]: `attach` / `complete` の呼び出し側へ返すプロトコル違反
//! - アプリケーションのエラー: `CompletionState::Error` に乗って流れる値
//!
//! エンジン自身が検出した不変条件違反（返す相手がいないもの）は
//! `domain::defect` を経由して報告する。

use std::any::Any;

use serde::{Deserialize, Serialize};

/// TaskError は一回限りの遷移に対するプロトコル違反
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum TaskError {
    /// A continuation has already been attached to this task.
    #[error("task already has a scheduled continuation")]
    AlreadyScheduled,

    /// The task has already been completed.
    #[error("task has already been completed")]
    AlreadyCompleted,

    /// The task has already handed its completion to a continuation.
    #[error("task has already been handed off to its continuation (garbage)")]
    AlreadyGarbaged,
}

/// A continuation transform panicked; the panic was stopped at the
/// continuation boundary and turned into this error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("continuation transform panicked: {message}")]
pub struct TransformPanicked {
    pub message: String,
}

impl TransformPanicked {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Extract a readable message from a `catch_unwind` payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
