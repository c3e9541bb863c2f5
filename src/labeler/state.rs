//! セッション状態ファイル
//!
//! 読み込みはラベルファイルと同じく「なければ・壊れていれば空」。
//! 保存時は永続化済みのスキップ集合とマージする（ロックなし、後勝ち）。

use super::store::write_atomically;
use crate::error::Result;
use mockup_common::SessionState;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> SessionState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return SessionState::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!("セッション状態が不正なため無視します {}: {}", self.path.display(), e);
                SessionState::default()
            }
        }
    }

    /// 永続化済みのスキップ集合とマージして全体を上書き
    pub fn save_merged(&self, state: &SessionState) -> Result<SessionState> {
        let merged = state.clone().merged_with(&self.load());
        let content = serde_json::to_string_pretty(&merged)?;
        write_atomically(&self.path, content.as_bytes())?;
        Ok(merged)
    }
}
