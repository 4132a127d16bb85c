//! Test helpers shared by the unit tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::ports::{Executor, Job, WorkQueue};

/// A queue that only collects jobs; the test decides when they run.
pub(crate) struct ManualQueue {
    jobs: Mutex<Vec<Job>>,
}

impl ManualQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn executor(self: &Arc<Self>) -> Executor {
        Executor::queue(self.clone())
    }

    pub(crate) fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Run queued jobs (including ones submitted while draining).
    pub(crate) fn run_all(&self) {
        loop {
            let jobs = std::mem::take(&mut *self.jobs.lock());
            if jobs.is_empty() {
                break;
            }
            for job in jobs {
                job();
            }
        }
    }
}

impl WorkQueue for ManualQueue {
    fn submit(&self, job: Job) {
        self.jobs.lock().push(job);
    }

    fn label(&self) -> &str {
        "manual"
    }
}
