//! ラベリングセッション状態（再開用）

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 永続化されるセッション状態
///
/// ラベルデータとは突き合わせない。ラベル済みかつスキップ済みのファイルもありうる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub current_index: usize,
    pub skipped: BTreeSet<String>,
    pub images_snapshot: Vec<String>,
}

impl SessionState {
    /// 永続化済みの状態とスキップ集合をマージ（後勝ち）
    pub fn merged_with(mut self, persisted: &SessionState) -> Self {
        self.skipped.extend(persisted.skipped.iter().cloned());
        self
    }
}
