//! Task identifiers.
//!
//! ULID ベースの ID。タスク生成順でソートでき、ログや defect レコードの
//! 突き合わせに使う（エンジンの意味論には関与しない）。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// TaskId は各 Task に一意に振られる識別子
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// 新しい ID を生成
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
