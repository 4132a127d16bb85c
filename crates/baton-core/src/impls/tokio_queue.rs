//! TokioQueue - tokio ランタイムへ継続を投げるキュー
//!
//! 継続本体は同期関数なので `spawn_blocking` で blocking pool に載せる
//! （async ワーカーを塞がないため）。複数の job は並行に走りうる。

use tokio::runtime::Handle;

use super::run_guarded;
use crate::ports::{Job, WorkQueue};

/// Work queue backed by a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioQueue {
    label: String,
    handle: Handle,
}

impl TokioQueue {
    pub fn new(handle: Handle, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            handle,
        }
    }

    /// Bind to the runtime the caller is running on, if any.
    pub fn try_current(label: impl Into<String>) -> Option<Self> {
        Handle::try_current().ok().map(|h| Self::new(h, label))
    }
}

impl WorkQueue for TokioQueue {
    fn submit(&self, job: Job) {
        let label = self.label.clone();
        // The JoinHandle is not needed: completion is observed through the task.
        drop(self.handle.spawn_blocking(move || run_guarded(&label, job)));
    }

    fn label(&self) -> &str {
        &self.label
    }
}
