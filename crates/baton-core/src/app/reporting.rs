//! Reporting - defect の最終受け口（プロセス全体で一つ）
//!
//! 本番では致命的なエラーでもアプリを落とすべきでない場面がある。
//! ここはそうしたエラーを受け止める最後の砦。
//!
//! # 設計
//! - 専用の [`SerialQueue`] を一本持ち、報告もハンドラ差し替えも全てそこへ積む
//!   （報告と差し替えが競合しない。報告元をブロックも再入もしない）
//! - 初期化は [`init`] で明示的に行う。呼ばれなければ最初の報告時に
//!   デフォルト設定で作られる
//! - ハンドラの panic（`DefectPolicy::Assert`）は報告スレッドで捕まえて記録し、
//!   次の [`flush`] で呼び出し側のスレッドに投げ直す

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::{BatonConfig, DefectPolicy};
use crate::domain::Defect;
use crate::domain::errors::panic_message;
use crate::impls::SerialQueue;
use crate::ports::{DefectHandler, Job, WorkQueue};

static REPORTER: OnceLock<Reporter> = OnceLock::new();

struct Reporter {
    /// `None` only if the reporter thread could not be spawned; reports are
    /// then delivered inline.
    queue: Option<SerialQueue>,
    handler: Arc<Mutex<Arc<dyn DefectHandler>>>,
    /// First handler panic not yet raised by `flush`.
    failure: Arc<Mutex<Option<String>>>,
}

impl Reporter {
    fn start(config: &BatonConfig) -> Self {
        let queue = match SerialQueue::new(config.reporter_thread_name.clone()) {
            Ok(q) => Some(q),
            Err(e) => {
                error!(error = %e, "cannot spawn defect reporter thread; reporting inline");
                None
            }
        };
        Self {
            queue,
            handler: Arc::new(Mutex::new(Arc::new(DefaultHandler::new(
                config.defect_policy,
            )))),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    fn replace_handler(&self, handler: Arc<dyn DefectHandler>) {
        let slot = Arc::clone(&self.handler);
        self.dispatch(Box::new(move || *slot.lock() = handler));
    }

    fn report(&self, defect: Defect) {
        let slot = Arc::clone(&self.handler);
        let failure = Arc::clone(&self.failure);
        self.dispatch(Box::new(move || {
            let handler = Arc::clone(&*slot.lock());
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler.handle(&defect))) {
                let message = panic_message(payload.as_ref());
                error!(task_id = %defect.task_id, panic = %message, "defect handler panicked");
                let mut first = failure.lock();
                if first.is_none() {
                    *first = Some(message);
                }
            }
        }));
    }

    /// Wait for queued reports, then raise a recorded handler panic here.
    fn flush(&self) {
        if let Some(q) = &self.queue {
            q.flush();
        }
        let failed = self.failure.lock().take();
        if let Some(message) = failed {
            panic!("defect handler failed: {message}");
        }
    }

    fn dispatch(&self, job: Job) {
        match &self.queue {
            Some(q) => q.submit(job),
            None => job(),
        }
    }
}

fn reporter() -> &'static Reporter {
    REPORTER.get_or_init(|| Reporter::start(&BatonConfig::default()))
}

/// Explicit startup: create the reporter from `config` and install the
/// default handler for its policy.
///
/// Returns `false` if the reporter already existed; the handler is still
/// replaced, but the thread name cannot change any more.
pub fn init(config: &BatonConfig) -> bool {
    let mut created = false;
    REPORTER.get_or_init(|| {
        created = true;
        Reporter::start(config)
    });
    if !created {
        warn!("defect reporter already running; only the handler is replaced");
        set_handler(DefaultHandler::new(config.defect_policy));
    }
    debug!(policy = ?config.defect_policy, "defect reporting initialized");
    created
}

/// Replace the process-wide handler. Reports submitted before this call are
/// still delivered to the previous handler.
pub fn set_handler(handler: impl DefectHandler + 'static) {
    reporter().replace_handler(Arc::new(handler));
}

/// Hand a defect to the sink. Never blocks on the handler.
pub fn report(defect: Defect) {
    debug!(task_id = %defect.task_id, kind = ?defect.kind, "defect reported");
    reporter().report(defect);
}

/// Block until every defect reported before this call has been handled.
/// This is a blocking call: from async code, go through `spawn_blocking`.
///
/// # Panics
/// If a handler panicked since the last flush (the default handler does so
/// under [`DefectPolicy::Assert`]), the panic is raised again here.
pub fn flush() {
    reporter().flush();
}

/// Handler installed at startup. Under [`DefectPolicy::Assert`] it panics
/// after logging; [`flush`] surfaces that panic to its caller.
#[derive(Debug, Clone, Copy)]
pub struct DefaultHandler {
    policy: DefectPolicy,
}

impl DefaultHandler {
    pub fn new(policy: DefectPolicy) -> Self {
        Self { policy }
    }
}

impl DefectHandler for DefaultHandler {
    fn handle(&self, defect: &Defect) {
        error!(
            task_id = %defect.task_id,
            kind = ?defect.kind,
            state = ?defect.state,
            "task defect: {}",
            defect.message
        );
        if self.policy == DefectPolicy::Assert {
            panic!(
                "a serious task defect occurred and could not be handled gracefully: {}",
                defect.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DefectKind, StateSnapshot, TaskId};

    fn unhandled(message: &str) -> Defect {
        Defect::new(
            DefectKind::UnhandledError,
            TaskId::generate(),
            StateSnapshot::CompleteError {
                error: message.to_string(),
            },
            message,
        )
    }

    fn reporter_with(policy: DefectPolicy, thread: &str) -> Reporter {
        let config = BatonConfig {
            defect_policy: policy,
            reporter_thread_name: thread.to_string(),
        };
        Reporter::start(&config)
    }

    #[test]
    fn default_handler_in_log_mode_does_not_panic() {
        let d = Defect::new(
            DefectKind::DiedWhileScheduled,
            TaskId::generate(),
            StateSnapshot::Garbage,
            "just logging",
        );
        DefaultHandler::new(DefectPolicy::Log).handle(&d);
    }

    #[test]
    #[should_panic(expected = "could not be handled gracefully")]
    fn default_handler_in_assert_mode_panics() {
        let d = Defect::new(
            DefectKind::UnhandledError,
            TaskId::generate(),
            StateSnapshot::Garbage,
            "loud",
        );
        DefaultHandler::new(DefectPolicy::Assert).handle(&d);
    }

    #[test]
    fn assert_policy_fails_the_next_flush() {
        let r = reporter_with(DefectPolicy::Assert, "test-reporter-assert");
        r.report(unhandled("unobserved"));

        let raised = catch_unwind(AssertUnwindSafe(|| r.flush())).unwrap_err();
        assert!(panic_message(raised.as_ref()).contains("unobserved"));

        // raised once; the reporter keeps working afterwards
        r.flush();
        r.report(unhandled("second"));
        assert!(catch_unwind(AssertUnwindSafe(|| r.flush())).is_err());
    }

    #[test]
    fn log_policy_flushes_quietly() {
        let r = reporter_with(DefectPolicy::Log, "test-reporter-log");
        r.report(unhandled("just logged"));
        r.report(unhandled("also logged"));
        r.flush();
    }

    #[test]
    fn replaced_handler_receives_later_reports() {
        let r = reporter_with(DefectPolicy::Assert, "test-reporter-replace");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        r.replace_handler(Arc::new(move |d: &Defect| s.lock().push(d.message.clone())));
        r.report(unhandled("captured"));
        r.flush();
        assert_eq!(*seen.lock(), vec!["captured".to_string()]);
    }
}
