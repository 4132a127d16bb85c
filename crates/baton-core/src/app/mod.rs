//! App - タスクエンジン本体
//!
//! domain の純粋な状態遷移に副作用（executor への投入、defect 報告）を載せる層。
//!
//! # 主要コンポーネント
//! - **Task / TaskController**: 一回限りの結果セルと、その生産者側ハンドル
//! - **continuation**: `on_complete` / `on_done` / `on_error`
//! - **fan_in**: `Task::wait_for_all_of`
//! - **reporting**: プロセス全体で一つの defect 受け口

pub mod continuation;
pub mod fan_in;
pub mod reporting;
pub mod task;

pub use self::reporting::DefaultHandler;
pub use self::task::{Task, TaskController};
