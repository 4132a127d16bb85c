//! Task engine: the cell that owns an execution state and performs its
//! transitions with their side effects.
//!
//! A task always runs its continuation on the executor chosen at attach time,
//! with no extra synchronization required from the caller.
//!
//! - Every task must end with `Done` or `Error`. Dying while a continuation
//!   is still waiting is a defect (reported through `app::reporting`).
//! - There is no cancellation concept. If you need one, put a "cancelled"
//!   value in the result type.
//! - A task can be continued only once. A second attach fails.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::reporting;
use crate::domain::{
    BoxError, CompletionState, Continuation, Defect, DefectKind, ExecutionState, Phase,
    RunningState, StateSnapshot, TaskError, TaskId, TransformPanicked,
};
use crate::ports::Executor;

/// One-shot admission permission.
///
/// Claiming is a single compare-and-swap, independent of (and checked before)
/// the logical state.
struct Permission(AtomicBool);

impl Permission {
    fn available() -> Self {
        Self(AtomicBool::new(true))
    }

    fn consumed() -> Self {
        Self(AtomicBool::new(false))
    }

    fn claim(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct TaskCell<T> {
    id: TaskId,
    state: Mutex<ExecutionState<T>>,
    schedulability: Permission,
    completeability: Permission,
}

impl<T> Drop for TaskCell<T> {
    fn drop(&mut self) {
        let state = &*self.state.get_mut();
        match state {
            ExecutionState::Running(RunningState::Scheduled(_)) => {
                reporting::report(Defect::new(
                    DefectKind::DiedWhileScheduled,
                    self.id,
                    state.snapshot(),
                    "task dropped while running with a scheduled continuation; \
                     the continuation can never run",
                ));
            }
            ExecutionState::Complete(CompletionState::Error(e)) => {
                let message = format!(
                    "task dropped while complete with an error `{e}` that was never handled"
                );
                reporting::report(Defect::new(
                    DefectKind::UnhandledError,
                    self.id,
                    state.snapshot(),
                    message,
                ));
            }
            // Unscheduled: a terminal task nobody continued. Done and Garbage
            // are the normal ends.
            _ => {}
        }
    }
}

/// A single-assignment result cell with at most one continuation.
///
/// `Task` is a shared handle: clones refer to the same task. The task is
/// reclaimed when the last handle is dropped; a continuation attached to a
/// predecessor does not count as a handle.
pub struct Task<T> {
    cell: Arc<TaskCell<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.cell.id)
            .field("phase", &self.phase())
            .finish()
    }
}

impl<T> Task<T> {
    fn with_state(state: ExecutionState<T>, completeability: Permission) -> Self {
        Self {
            cell: Arc::new(TaskCell {
                id: TaskId::generate(),
                state: Mutex::new(state),
                schedulability: Permission::available(),
                completeability,
            }),
        }
    }

    /// A running task waiting for its producer.
    pub(crate) fn pending() -> Self {
        Self::with_state(ExecutionState::default(), Permission::available())
    }

    /// An already completed task.
    pub fn from_completion(value: CompletionState<T>) -> Self {
        Self::with_state(ExecutionState::completed(value), Permission::consumed())
    }

    /// An already completed task holding `value`.
    pub fn done(value: T) -> Self {
        Self::from_completion(CompletionState::Done(value))
    }

    /// An already failed task.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::from_completion(CompletionState::Error(error.into()))
    }

    pub fn id(&self) -> TaskId {
        self.cell.id
    }

    pub fn phase(&self) -> Phase {
        self.cell.state.lock().phase()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.cell.state.lock().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.cell.state.lock().is_running()
    }

    pub fn is_complete(&self) -> bool {
        self.cell.state.lock().is_complete()
    }

    pub fn is_garbage(&self) -> bool {
        self.cell.state.lock().is_garbage()
    }
}

impl<T: Send + 'static> Task<T> {
    /// Attach the one continuation this task may ever have.
    ///
    /// `transform` receives this task's completion and produces the derived
    /// task's completion. An `Err` or a panic from `transform` completes the
    /// derived task with `Error`; nothing unwinds past the continuation.
    ///
    /// - running: the continuation is stored and runs when this task completes
    /// - complete: the continuation is submitted to `executor` right away
    ///
    /// The returned task is new and owned by the caller. The continuation
    /// only holds a weak handle to it: if every caller handle is dropped
    /// before this task completes, the transform is skipped.
    pub fn attach<U, F>(&self, executor: Executor, transform: F) -> Result<Task<U>, TaskError>
    where
        U: Send + 'static,
        F: FnOnce(CompletionState<T>) -> Result<CompletionState<U>, BoxError> + Send + 'static,
    {
        if !self.cell.schedulability.claim() {
            debug!(task_id = %self.cell.id, "attach refused: continuation already claimed");
            return Err(TaskError::AlreadyScheduled);
        }

        let derived = Task::<U>::pending();
        let weak = Arc::downgrade(&derived.cell);
        let continuation = Continuation::new(executor, move |value| {
            run_continuation(weak, transform, value)
        });

        let scheduled = {
            let mut state = self.cell.state.lock();
            state.schedule(continuation).map_err(|e| (e, state.snapshot()))
        };

        match scheduled {
            Ok(None) => {
                trace!(task_id = %self.cell.id, derived = %derived.cell.id, "continuation scheduled");
            }
            Ok(Some(continuation)) => {
                trace!(task_id = %self.cell.id, derived = %derived.cell.id, "task already complete; continuing now");
                self.hand_off(continuation);
            }
            // Not reachable: the schedulability flag above admits one attach,
            // and only attach leaves Unscheduled. Reported, never expected.
            Err((error, snapshot)) => {
                let (kind, message) = match error {
                    TaskError::AlreadyGarbaged => (
                        DefectKind::ContinuedFromGarbage,
                        "cannot continue from a task that was already handed off (garbage)",
                    ),
                    _ => (
                        DefectKind::AlreadyScheduled,
                        "task already has a scheduled continuation; cannot schedule another",
                    ),
                };
                reporting::report(Defect::new(kind, self.cell.id, snapshot, message));
                return Err(error);
            }
        }
        Ok(derived)
    }

    /// Store the result. Producer side only, reached through
    /// [`TaskController`] or a predecessor's continuation.
    pub(crate) fn complete(&self, value: CompletionState<T>) -> Result<(), TaskError> {
        if !self.cell.completeability.claim() {
            debug!(task_id = %self.cell.id, "complete refused: already completed");
            return Err(TaskError::AlreadyCompleted);
        }

        let completed = {
            let mut state = self.cell.state.lock();
            state.complete(value).map_err(|e| (e, state.snapshot()))
        };

        match completed {
            Ok(None) => {
                trace!(task_id = %self.cell.id, "task completed (terminal)");
                Ok(())
            }
            Ok(Some(continuation)) => {
                trace!(task_id = %self.cell.id, "task completed; dispatching continuation");
                self.hand_off(continuation);
                Ok(())
            }
            // Not reachable: the completeability flag admits one completion,
            // and Garbage is only entered after it. Reported, never expected.
            Err((TaskError::AlreadyGarbaged, snapshot)) => {
                reporting::report(Defect::new(
                    DefectKind::CompletedGarbage,
                    self.cell.id,
                    snapshot,
                    "cannot complete a task that was already handed off (garbage)",
                ));
                Err(TaskError::AlreadyGarbaged)
            }
            Err((error, _)) => Err(error),
        }
    }

    /// Complete, turning a failure into a defect (there is nobody to return
    /// it to).
    ///
    /// Only used on derived tasks, which no controller can reach and whose
    /// one continuation completes them once, so the defect cannot fire.
    fn complete_or_report(&self, value: CompletionState<T>) {
        if let Err(cause) = self.complete(value) {
            let message =
                format!("cannot set continuation task state to completed due to `{cause}`");
            reporting::report(Defect::new(
                DefectKind::CompletionFailed { cause },
                self.cell.id,
                self.snapshot(),
                message,
            ));
        }
    }

    /// Submit `continuation` to its executor. When it runs it moves the
    /// completion out (this task becomes garbage) and invokes the body.
    ///
    /// The job keeps this task alive until then.
    fn hand_off(&self, continuation: Continuation<T>) {
        let Continuation { executor, function } = continuation;
        let cell = Arc::clone(&self.cell);
        executor.execute(Box::new(move || {
            let taken = cell.state.lock().take_completion();
            match taken {
                Ok(value) => function(value),
                // Not reachable: hand-off is only issued after the state became
                // Complete, and this job is its only taker.
                Err(phase) => {
                    let (kind, message) = if phase == Phase::Garbage {
                        (
                            DefectKind::ContinuedFromGarbage,
                            "cannot continue from a disposed (garbage) task",
                        )
                    } else {
                        (
                            DefectKind::ContinuedBeforeCompletion,
                            "a task must not continue before it completes",
                        )
                    };
                    let snapshot = cell.state.lock().snapshot();
                    reporting::report(Defect::new(kind, cell.id, snapshot, message));
                }
            }
        }));
    }
}

/// Body of every continuation built by [`Task::attach`].
fn run_continuation<T, U, F>(derived: Weak<TaskCell<U>>, transform: F, value: CompletionState<T>)
where
    U: Send + 'static,
    F: FnOnce(CompletionState<T>) -> Result<CompletionState<U>, BoxError>,
{
    let Some(cell) = derived.upgrade() else {
        trace!("derived task already reclaimed; skipping continuation");
        return;
    };
    let derived = Task { cell };

    let next = match catch_unwind(AssertUnwindSafe(move || transform(value))) {
        Ok(Ok(next)) => next,
        Ok(Err(cause)) => CompletionState::Error(cause),
        Err(payload) => CompletionState::error(TransformPanicked::from_payload(payload)),
    };
    derived.complete_or_report(next);
}

/// Producer-side handle: the only way to complete a task created with
/// [`TaskController::new`].
pub struct TaskController<T> {
    task: Task<T>,
}

impl<T: Send + 'static> TaskController<T> {
    pub fn new() -> Self {
        Self {
            task: Task::pending(),
        }
    }

    /// Consumer handle for the controlled task.
    pub fn task(&self) -> Task<T> {
        self.task.clone()
    }

    /// Complete the task. Succeeds once; later calls get `AlreadyCompleted`.
    pub fn complete(&self, value: CompletionState<T>) -> Result<(), TaskError> {
        self.task.complete(value)
    }

    pub fn done(&self, value: T) -> Result<(), TaskError> {
        self.complete(CompletionState::Done(value))
    }

    pub fn fail(&self, error: impl Into<BoxError>) -> Result<(), TaskError> {
        self.complete(CompletionState::Error(error.into()))
    }
}

impl<T: Send + 'static> Default for TaskController<T> {
    fn default() -> Self {
        Self::new()
    }
}
