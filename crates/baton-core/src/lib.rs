//! baton-core
//!
//! Single-assignment tasks with exactly one continuation.
//!
//! # モジュール構成
//! - **domain**: 値と純粋な状態遷移（CompletionState, ExecutionState, Defect, TaskId）
//! - **ports**: 抽象化レイヤー（WorkQueue / Executor, DefectHandler）
//! - **impls**: 実装（SerialQueue, TokioQueue）
//! - **app**: エンジン（Task, TaskController, 継続, fan-in, defect 報告）
//! - **config**: BatonConfig / DefectPolicy
//!
//! ```
//! use baton_core::{Task, TaskController};
//!
//! let controller = TaskController::<u32>::new();
//! let doubled = controller
//!     .task()
//!     .on_done(|x| Ok::<_, std::convert::Infallible>(x * 2));
//! controller.done(21).unwrap();
//! assert!(doubled.is_complete());
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::reporting;
pub use app::{DefaultHandler, Task, TaskController};
pub use config::{BatonConfig, DefectPolicy};
pub use domain::{BoxError, CompletionState, Defect, DefectKind, Phase, StateSnapshot, TaskError, TaskId};
pub use impls::{SerialQueue, TokioQueue};
pub use ports::{DefectHandler, Executor, WorkQueue};

/// Explicit startup: build the defect reporter from `config`.
///
/// Optional. Without it the reporter starts lazily with the default config
/// on the first defect. Returns `false` if the reporter was already running.
pub fn init(config: &BatonConfig) -> bool {
    reporting::init(config)
}
