//! State - タスクの論理状態（純粋な状態機械）
//!
//! タスクの状態は次の段階に分かれる:
//!
//! 1. Running（継続なし）
//! 2. Running（継続が一つ予約済み）
//! 3. Complete（Done または Error）
//! 4. Garbage（完了値を継続へ引き渡し済み）
//!
//! ```text
//! Running(Unscheduled) ──schedule──► Running(Scheduled)
//!        │                                  │
//!        └──────complete──► Complete ◄──────┘ complete
//!                              │
//!                              └── take_completion ──► Garbage
//! ```
//!
//! # メンテナへ
//! このモジュールには副作用を一切置かないこと。executor への submit、
//! defect の報告、ロック、ログはすべて `app::task` の責務。
//! ここにあるのは全域関数としての遷移だけ。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::completion::CompletionState;
use super::errors::TaskError;
use crate::ports::{Executor, ExecutorKind};

/// Body of a scheduled continuation: receives the completion value once.
pub type ContinuationFn<T> = Box<dyn FnOnce(CompletionState<T>) + Send + 'static>;

/// A continuation: the executor it must run on plus its body.
pub struct Continuation<T> {
    pub executor: Executor,
    pub function: ContinuationFn<T>,
}

impl<T> Continuation<T> {
    pub fn new(
        executor: Executor,
        function: impl FnOnce(CompletionState<T>) + Send + 'static,
    ) -> Self {
        Self {
            executor,
            function: Box::new(function),
        }
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

/// Sub-state of a running task.
#[derive(Debug)]
pub enum RunningState<T> {
    Unscheduled,
    Scheduled(Continuation<T>),
}

/// Where a task currently stands. Exactly one variant holds at a time and
/// transitions never go backward.
#[derive(Debug)]
pub enum ExecutionState<T> {
    Running(RunningState<T>),
    Complete(CompletionState<T>),
    Garbage,
}

impl<T> Default for ExecutionState<T> {
    fn default() -> Self {
        ExecutionState::Running(RunningState::Unscheduled)
    }
}

impl<T> ExecutionState<T> {
    pub fn completed(value: CompletionState<T>) -> Self {
        ExecutionState::Complete(value)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionState::Running(_))
    }

    pub fn is_unscheduled(&self) -> bool {
        matches!(self, ExecutionState::Running(RunningState::Unscheduled))
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, ExecutionState::Running(RunningState::Scheduled(_)))
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ExecutionState::Complete(_))
    }

    pub fn is_garbage(&self) -> bool {
        matches!(self, ExecutionState::Garbage)
    }

    pub fn completion(&self) -> Option<&CompletionState<T>> {
        match self {
            ExecutionState::Complete(c) => Some(c),
            _ => None,
        }
    }

    /// Attach a continuation.
    ///
    /// - `Running(Unscheduled)` → `Running(Scheduled)`; returns `None`
    ///   (nothing to run until completion).
    /// - `Complete` stays `Complete`; the continuation is handed back as
    ///   `Some` and must run now.
    /// - `Running(Scheduled)` → `AlreadyScheduled`, `Garbage` →
    ///   `AlreadyGarbaged`; the state is left untouched.
    pub fn schedule(
        &mut self,
        continuation: Continuation<T>,
    ) -> Result<Option<Continuation<T>>, TaskError> {
        match self {
            ExecutionState::Running(RunningState::Unscheduled) => {
                *self = ExecutionState::Running(RunningState::Scheduled(continuation));
                Ok(None)
            }
            ExecutionState::Running(RunningState::Scheduled(_)) => {
                Err(TaskError::AlreadyScheduled)
            }
            ExecutionState::Complete(_) => Ok(Some(continuation)),
            ExecutionState::Garbage => Err(TaskError::AlreadyGarbaged),
        }
    }

    /// Store the completion value.
    ///
    /// `Running(_)` → `Complete(value)`, returning the continuation that was
    /// waiting for it (if any). A task with no continuation stays `Complete`
    /// for good.
    pub fn complete(
        &mut self,
        value: CompletionState<T>,
    ) -> Result<Option<Continuation<T>>, TaskError> {
        match self {
            ExecutionState::Running(_) => {
                let previous = std::mem::replace(self, ExecutionState::Complete(value));
                match previous {
                    ExecutionState::Running(RunningState::Scheduled(k)) => Ok(Some(k)),
                    _ => Ok(None),
                }
            }
            ExecutionState::Complete(_) => Err(TaskError::AlreadyCompleted),
            ExecutionState::Garbage => Err(TaskError::AlreadyGarbaged),
        }
    }

    /// Move the completion value out for a continuation: `Complete` →
    /// `Garbage`. Any other state is returned as its [`Phase`] and left
    /// untouched.
    pub fn take_completion(&mut self) -> Result<CompletionState<T>, Phase> {
        match std::mem::replace(self, ExecutionState::Garbage) {
            ExecutionState::Complete(c) => Ok(c),
            other => {
                let phase = other.phase();
                *self = other;
                Err(phase)
            }
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            ExecutionState::Running(RunningState::Unscheduled) => Phase::RunningUnscheduled,
            ExecutionState::Running(RunningState::Scheduled(_)) => Phase::RunningScheduled,
            ExecutionState::Complete(CompletionState::Done(_)) => Phase::CompleteDone,
            ExecutionState::Complete(CompletionState::Error(_)) => Phase::CompleteError,
            ExecutionState::Garbage => Phase::Garbage,
        }
    }

    /// Data-only copy of this state for diagnostics.
    pub fn snapshot(&self) -> StateSnapshot {
        match self {
            ExecutionState::Running(RunningState::Unscheduled) => StateSnapshot::RunningUnscheduled,
            ExecutionState::Running(RunningState::Scheduled(k)) => StateSnapshot::RunningScheduled {
                executor: k.executor.kind(),
            },
            ExecutionState::Complete(CompletionState::Done(_)) => StateSnapshot::CompleteDone,
            ExecutionState::Complete(CompletionState::Error(e)) => StateSnapshot::CompleteError {
                error: e.to_string(),
            },
            ExecutionState::Garbage => StateSnapshot::Garbage,
        }
    }
}

/// Coarse state tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RunningUnscheduled,
    RunningScheduled,
    CompleteDone,
    CompleteError,
    Garbage,
}

/// Serializable picture of an [`ExecutionState`], carried by defect records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StateSnapshot {
    RunningUnscheduled,
    RunningScheduled { executor: ExecutorKind },
    CompleteDone,
    CompleteError { error: String },
    Garbage,
}

impl StateSnapshot {
    pub fn phase(&self) -> Phase {
        match self {
            StateSnapshot::RunningUnscheduled => Phase::RunningUnscheduled,
            StateSnapshot::RunningScheduled { .. } => Phase::RunningScheduled,
            StateSnapshot::CompleteDone => Phase::CompleteDone,
            StateSnapshot::CompleteError { .. } => Phase::CompleteError,
            StateSnapshot::Garbage => Phase::Garbage,
        }
    }
}
