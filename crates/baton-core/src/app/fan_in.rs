//! FanIn - 複数タスクの合流
//!
//! 公開 API（`attach` と `TaskController`）だけで組み立てる。
//!
//! # 設計
//! - 入力ごとに `Immediate` の継続を付け、到着した順に結果を積む
//! - N 件目の到着で controller を完了させる（ロックは外してから）
//! - 個々の失敗は `Error` 要素として残し、集約自体は失敗させない

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use super::task::{Task, TaskController};
use crate::domain::CompletionState;
use crate::ports::Executor;

struct Accumulator<T> {
    expected: usize,
    arrived: Vec<CompletionState<T>>,
    /// Per-input derived tasks. Continuations only hold weak handles to
    /// them, so something has to own them until they run.
    keepalive: Vec<Task<()>>,
}

impl<T: Send + 'static> Task<T> {
    /// Wait for every task in `tasks` and collect their completions in
    /// arrival order.
    ///
    /// The result completes exactly once, always with `Done`. Inputs that are
    /// already complete arrive synchronously, in slice order.
    pub fn wait_for_all_of(tasks: &[Task<T>]) -> Task<Vec<CompletionState<T>>> {
        let controller = Arc::new(TaskController::new());
        let result = controller.task();
        let expected = tasks.len();

        if expected == 0 {
            finish(&controller, Vec::new());
            return result;
        }

        let acc = Arc::new(Mutex::new(Accumulator {
            expected,
            arrived: Vec::with_capacity(expected),
            keepalive: Vec::with_capacity(expected),
        }));

        for task in tasks {
            let a = Arc::clone(&acc);
            let c = Arc::clone(&controller);
            let attached = task.attach(Executor::Immediate, move |completion| {
                arrive(&a, &c, completion);
                Ok(CompletionState::Done(()))
            });
            match attached {
                Ok(derived) => acc.lock().keepalive.push(derived),
                Err(e) => {
                    debug!(task_id = %task.id(), error = %e, "fan-in input refused continuation");
                    arrive(&acc, &controller, CompletionState::error(e));
                }
            }
        }

        trace!(result = %result.id(), inputs = expected, "fan-in armed");
        result
    }
}

fn arrive<T: Send + 'static>(
    acc: &Mutex<Accumulator<T>>,
    controller: &TaskController<Vec<CompletionState<T>>>,
    completion: CompletionState<T>,
) {
    let ready = {
        let mut acc = acc.lock();
        acc.arrived.push(completion);
        if acc.arrived.len() == acc.expected {
            Some(std::mem::take(&mut acc.arrived))
        } else {
            None
        }
    };
    if let Some(all) = ready {
        finish(controller, all);
    }
}

fn finish<T: Send + 'static>(
    controller: &TaskController<Vec<CompletionState<T>>>,
    all: Vec<CompletionState<T>>,
) {
    let Err(first) = controller.done(all) else {
        return;
    };
    if let Err(second) = controller.fail(first) {
        error!(
            task_id = %controller.task().id(),
            error = %second,
            "cannot complete fan-in result even with an error; aborting"
        );
        std::process::abort();
    }
}
