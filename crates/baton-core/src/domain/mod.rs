//! Domain model (completion values, execution states, defects, ids).
//!
//! ここには I/O もスケジューリングも置かない。遷移関数は全て純粋。

pub mod completion;
pub mod defect;
pub mod errors;
pub mod ids;
pub mod state;

pub use self::completion::{BoxError, CompletionState};
pub use self::defect::{Defect, DefectKind};
pub use self::errors::{TaskError, TransformPanicked};
pub use self::ids::TaskId;
pub use self::state::{
    Continuation, ContinuationFn, ExecutionState, Phase, RunningState, StateSnapshot,
};
