//! Convenience continuations on top of [`Task::attach`].
//!
//! These never fail: if `attach` refuses (the task was already continued),
//! the returned task is already failed with that [`TaskError`], so the
//! misuse still surfaces downstream (and as a defect if nobody looks).
//!
//! [`TaskError`]: crate::domain::TaskError

use tracing::warn;

use super::task::Task;
use crate::domain::{BoxError, CompletionState};
use crate::ports::Executor;

impl<T: Send + 'static> Task<T> {
    /// Continue on the caller's own flow with a full-completion transform.
    pub fn on_complete<U, F>(&self, transform: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(CompletionState<T>) -> CompletionState<U> + Send + 'static,
    {
        self.on_complete_in(Executor::Immediate, transform)
    }

    /// Like [`Task::on_complete`], on an explicit executor.
    pub fn on_complete_in<U, F>(&self, executor: Executor, transform: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(CompletionState<T>) -> CompletionState<U> + Send + 'static,
    {
        match self.attach(executor, move |c| Ok(transform(c))) {
            Ok(derived) => derived,
            Err(e) => {
                warn!(task_id = %self.id(), error = %e, "cannot continue task; returning a failed task");
                Task::failed(e)
            }
        }
    }

    /// Map a success value. `Error` passes through untouched and `transform`
    /// is not called.
    pub fn on_done<U, E, F>(&self, transform: F) -> Task<U>
    where
        U: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.on_complete(move |c| match c {
            CompletionState::Done(v) => transform(v).into(),
            CompletionState::Error(e) => CompletionState::Error(e),
        })
    }

    /// Recover from an error. `Done` passes through untouched; this is the
    /// one sanctioned way to consume an `Error`.
    pub fn on_error<E, F>(&self, recover: F) -> Task<T>
    where
        E: Into<BoxError>,
        F: FnOnce(BoxError) -> Result<T, E> + Send + 'static,
    {
        self.on_complete(move |c| match c {
            CompletionState::Done(v) => CompletionState::Done(v),
            CompletionState::Error(e) => recover(e).into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::app::TaskController;
    use crate::domain::{Phase, StateSnapshot, TaskError};
    use rstest::rstest;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct Oops(&'static str);

    /// Pull the final outcome out of a completed task by continuing it.
    fn outcome<T: Send + std::fmt::Debug + 'static>(task: &Task<T>) -> Result<T, String> {
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let s = Arc::clone(&slot);
        let _ = task.on_complete(move |c| {
            *s.lock() = Some(c.into_result().map_err(|e| e.to_string()));
            CompletionState::Done(())
        });
        let taken = slot.lock().take();
        taken.expect("task was not complete")
    }

    #[rstest]
    #[case(1, 2, 5)]
    #[case(1222, 2444, 2447)]
    fn on_done_chain_equals_direct_composition(
        #[case] v: i32,
        #[case] after_f: i32,
        #[case] after_g: i32,
    ) {
        let f = |x: i32| Ok::<_, Oops>(x * 2);
        let g = |x: i32| Ok::<_, Oops>(x + 3);

        let first = Task::done(v).on_done(f);
        assert_eq!(f(v).unwrap(), after_f);
        let chained = first.on_done(g);
        assert_eq!(outcome(&chained), Ok(after_g));

        let direct = Task::done(g(f(v).unwrap()).unwrap());
        assert_eq!(outcome(&direct), Ok(after_g));
    }

    #[test]
    fn failing_on_done_short_circuits() {
        let g_ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&g_ran);

        let failed = Task::done(1).on_done(|_| Err::<i32, _>(Oops("f failed")));
        let after = failed.on_done(move |x: i32| {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, Oops>(x)
        });

        assert_eq!(outcome(&after), Err("f failed".to_string()));
        assert!(!g_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn on_error_recovers() {
        let recovered = Task::<i32>::failed(Oops("e")).on_error(|e| {
            assert_eq!(e.to_string(), "e");
            Ok::<_, Oops>(99)
        });
        assert_eq!(outcome(&recovered), Ok(99));
    }

    #[test]
    fn on_error_can_fail_again() {
        let still_failed =
            Task::<i32>::failed(Oops("e1")).on_error(|_| Err::<i32, _>(Oops("e2")));
        assert_eq!(outcome(&still_failed), Err("e2".to_string()));
    }

    #[test]
    fn on_error_passes_done_through() {
        let called = Arc::new(AtomicBool::new(false));
        let c = Arc::clone(&called);
        let t = Task::done(5).on_error(move |_| {
            c.store(true, Ordering::SeqCst);
            Ok::<_, Oops>(0)
        });
        assert_eq!(outcome(&t), Ok(5));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_on_done_becomes_error() {
        let t = Task::done(1).on_done(|_| -> Result<i32, Oops> { panic!("bad map") });
        let err = outcome(&t).unwrap_err();
        assert!(err.contains("bad map"), "{err}");
    }

    #[test]
    fn second_continuation_yields_failed_task() {
        let c = TaskController::<i32>::new();
        let t = c.task();
        let first = t.on_done(|x| Ok::<_, Oops>(x));
        let second = t.on_done(|x| Ok::<_, Oops>(x));

        assert_eq!(second.phase(), Phase::CompleteError);
        assert_eq!(
            second.snapshot(),
            StateSnapshot::CompleteError {
                error: TaskError::AlreadyScheduled.to_string()
            }
        );
        let _ = second.on_error(|_| Ok::<i32, Oops>(0));

        c.done(4).unwrap();
        assert_eq!(outcome(&first), Ok(4));
    }

    #[test]
    fn on_complete_in_uses_the_executor() {
        let queue = crate::test_support::ManualQueue::new();
        let t = Task::done(2).on_complete_in(queue.executor(), |c| c.map(|x| x * 10));
        assert!(t.is_running());
        queue.run_all();
        assert_eq!(outcome(&t), Ok(20));
    }
}
