//! Ports - 抽象化レイヤー
//!
//! エンジンが外側に求めるものは二つだけ:
//! - 継続を走らせる場所（[`WorkQueue`] / [`Executor`]）
//! - defect の受け口（[`DefectHandler`]）

pub mod defect_sink;
pub mod executor;

pub use self::defect_sink::DefectHandler;
pub use self::executor::{Executor, ExecutorKind, Job, WorkQueue};
