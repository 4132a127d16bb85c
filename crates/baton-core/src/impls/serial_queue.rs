//! SerialQueue - 専用スレッドで一件ずつ実行するキュー
//!
//! # 実装詳細
//! - tokio の unbounded channel に job を積む（送信側は同期でも async でもよい）
//! - 受信側は名前付きの専用スレッドで `blocking_recv` する
//! - `flush` は oneshot を積んで `blocking_recv` で待つ（async ランタイム上からは呼ばないこと）
//! - job の panic はスレッド内で捕まえてログに出し、キューは止めない
//! - `SerialQueue` を drop すると channel が閉じ、スレッドは残りを実行して終了する

use std::thread::ThreadId;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::run_guarded;
use crate::ports::{Job, WorkQueue};

/// FIFO queue backed by one dedicated thread.
pub struct SerialQueue {
    label: String,
    tx: mpsc::UnboundedSender<Job>,
    worker: ThreadId,
}

impl SerialQueue {
    /// Spawn the worker thread. The label doubles as the thread name.
    pub fn new(label: impl Into<String>) -> std::io::Result<Self> {
        let label = label.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let thread_label = label.clone();
        let handle = std::thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                debug!(queue = %thread_label, "serial queue started");
                while let Some(job) = rx.blocking_recv() {
                    run_guarded(&thread_label, job);
                }
                debug!(queue = %thread_label, "serial queue stopped");
            })?;

        Ok(Self {
            label,
            tx,
            worker: handle.thread().id(),
        })
    }

    /// Block until every job submitted before this call has run.
    ///
    /// Called from the queue's own thread this returns immediately, since
    /// waiting there could never finish.
    pub fn flush(&self) {
        if std::thread::current().id() == self.worker {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel::<()>();
        self.submit(Box::new(move || {
            let _ = done_tx.send(());
        }));
        // Err only if the worker is gone, in which case nothing is pending.
        let _ = done_rx.blocking_recv();
    }
}

impl WorkQueue for SerialQueue {
    fn submit(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!(queue = %self.label, "serial queue worker is gone; job dropped");
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn runs_jobs_in_submission_order() {
        let queue = SerialQueue::new("test-serial-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            queue.submit(Box::new(move || seen.lock().push(i)));
        }
        queue.flush();

        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn runs_on_the_named_thread() {
        let queue = SerialQueue::new("test-serial-name").unwrap();
        let name = Arc::new(Mutex::new(None));
        let n = Arc::clone(&name);
        queue.submit(Box::new(move || {
            *n.lock() = std::thread::current().name().map(str::to_string);
        }));
        queue.flush();
        assert_eq!(name.lock().as_deref(), Some("test-serial-name"));
    }

    #[test]
    fn survives_a_panicking_job() {
        let queue = SerialQueue::new("test-serial-panic").unwrap();
        let hit = Arc::new(Mutex::new(false));

        queue.submit(Box::new(|| panic!("job blew up")));
        let h = Arc::clone(&hit);
        queue.submit(Box::new(move || *h.lock() = true));
        queue.flush();

        assert!(*hit.lock());
    }

    #[test]
    fn flush_from_the_worker_does_not_deadlock() {
        let queue = Arc::new(SerialQueue::new("test-serial-reentrant").unwrap());
        let q = Arc::clone(&queue);
        let hit = Arc::new(Mutex::new(false));
        let h = Arc::clone(&hit);
        queue.submit(Box::new(move || {
            q.flush();
            *h.lock() = true;
        }));
        queue.flush();
        assert!(*hit.lock());
    }

    #[test]
    fn flush_still_works_after_a_panicking_job() {
        let queue = SerialQueue::new("test-serial-gone").unwrap();
        queue.submit(Box::new(|| panic!("first")));
        queue.flush();

        // a job that never sends still lets flush finish once it has run
        let (tx, rx) = oneshot::channel::<()>();
        queue.submit(Box::new(move || drop(tx)));
        queue.flush();
        assert!(rx.blocking_recv().is_err());
    }
}
