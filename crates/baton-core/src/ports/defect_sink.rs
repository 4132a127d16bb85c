//! DefectSink port - defect の受け手
//!
//! ホストは起動時にハンドラを差し替えられる（開発中は assert、本番ではログや
//! テレメトリへ送るなど）。呼び出しは常に報告専用のシリアルキュー上で行われる
//! ので、ハンドラ自身は同期を気にしなくてよい。

use crate::domain::Defect;

/// DefectHandler は defect レコードを一件ずつ受け取る
pub trait DefectHandler: Send + Sync {
    fn handle(&self, defect: &Defect);
}

impl<F> DefectHandler for F
where
    F: Fn(&Defect) + Send + Sync,
{
    fn handle(&self, defect: &Defect) {
        self(defect)
    }
}
