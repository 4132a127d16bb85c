//! Executor port - 継続を実行する場所の抽象化
//!
//! エンジンはキューの内部を一切見ない。要求するのは
//! 「ゼロ引数の仕事を受け取り、いつか一度だけ実行する」ことだけ。
//! FIFO 性も、無関係な submit 同士の順序も仮定しない。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A zero-argument unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// WorkQueue は非同期実行コンテキスト（ホスト提供）
///
/// # 契約
/// - `submit` はすぐに戻る
/// - 投入された job はいつか、どこかのスレッドで、ちょうど一度実行される
pub trait WorkQueue: Send + Sync {
    fn submit(&self, job: Job);

    /// Human-readable name used in logs and defect snapshots.
    fn label(&self) -> &str;
}

/// Where a continuation runs.
#[derive(Clone, Default)]
pub enum Executor {
    /// Run synchronously in the caller's own control flow.
    #[default]
    Immediate,

    /// Submit to a queue and return immediately.
    Queue(Arc<dyn WorkQueue>),
}

impl Executor {
    pub fn queue(queue: Arc<dyn WorkQueue>) -> Self {
        Executor::Queue(queue)
    }

    pub fn execute(&self, job: Job) {
        match self {
            Executor::Immediate => job(),
            Executor::Queue(q) => q.submit(job),
        }
    }

    pub fn kind(&self) -> ExecutorKind {
        match self {
            Executor::Immediate => ExecutorKind::Immediate,
            Executor::Queue(q) => ExecutorKind::Queue {
                label: q.label().to_string(),
            },
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Immediate => f.write_str("Immediate"),
            Executor::Queue(q) => f.debug_tuple("Queue").field(&q.label()).finish(),
        }
    }
}

/// Data-only description of an [`Executor`], for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorKind {
    Immediate,
    Queue { label: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualQueue;
    use parking_lot::Mutex;

    #[test]
    fn immediate_runs_inline() {
        let hit = Arc::new(Mutex::new(false));
        let h = Arc::clone(&hit);
        Executor::Immediate.execute(Box::new(move || *h.lock() = true));
        assert!(*hit.lock());
    }

    #[test]
    fn queue_defers_until_drained() {
        let queue = ManualQueue::new();
        let hit = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hit);

        queue.executor().execute(Box::new(move || *h.lock() += 1));
        assert_eq!(*hit.lock(), 0);
        assert_eq!(queue.pending(), 1);

        queue.run_all();
        assert_eq!(*hit.lock(), 1);
    }

    #[test]
    fn kind_carries_queue_label() {
        assert_eq!(Executor::Immediate.kind(), ExecutorKind::Immediate);
        assert_eq!(
            ManualQueue::new().executor().kind(),
            ExecutorKind::Queue {
                label: "manual".to_string()
            }
        );
    }
}
