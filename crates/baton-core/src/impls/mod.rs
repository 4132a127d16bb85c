//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SerialQueue**: 専用スレッド一本で FIFO に実行するキュー（defect 報告にも使う）
//! - **TokioQueue**: tokio ランタイムの blocking pool へ投げるキュー

pub mod serial_queue;
pub mod tokio_queue;

pub use self::serial_queue::SerialQueue;
pub use self::tokio_queue::TokioQueue;

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::domain::errors::panic_message;
use crate::ports::Job;

/// Run a job, logging (not propagating) a panic so the worker survives.
pub(crate) fn run_guarded(queue: &str, job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(
            queue,
            panic = %panic_message(payload.as_ref()),
            "job panicked on work queue"
        );
    }
}
