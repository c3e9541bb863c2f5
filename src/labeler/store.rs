//! ラベルファイルの読み書き
//!
//! 保存のたびに直前のファイルをタイムスタンプ付きでバックアップしてから全体を書き直す。
//! 本体は一時ファイルに書いてから rename で置き換える。

use crate::error::Result;
use mockup_common::LabelMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// ラベルファイル
#[derive(Debug, Clone)]
pub struct LabelStore {
    path: PathBuf,
}

impl LabelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 読み込み。ファイルがない・壊れている場合は空
    pub fn load(&self) -> LabelMap {
        if !self.path.exists() {
            return LabelMap::new();
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!("ラベルファイルを開けません {}: {}", self.path.display(), e);
                return LabelMap::new();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(labels) => labels,
            Err(e) => {
                warn!("ラベルファイルが不正なため空として扱います {}: {}", self.path.display(), e);
                LabelMap::new()
            }
        }
    }

    /// バックアップしてから保存。作成したバックアップのパスを返す
    pub fn save(&self, labels: &LabelMap) -> Result<Option<PathBuf>> {
        let dir = parent_dir(&self.path);
        std::fs::create_dir_all(&dir)?;

        let backup = if self.path.exists() {
            let backup_path = self.backup_path(&chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());
            match std::fs::copy(&self.path, &backup_path) {
                Ok(_) => Some(backup_path),
                Err(e) => {
                    warn!("バックアップ作成に失敗: {}", e);
                    None
                }
            }
        } else {
            None
        };

        write_atomically(&self.path, &to_json_4space(labels)?)?;
        debug!("ラベル保存: {} ({}件)", self.path.display(), labels.len());

        Ok(backup)
    }

    /// `<stem>.backup-<timestamp>.json`
    pub fn backup_path(&self, timestamp: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "logos".to_string());
        parent_dir(&self.path).join(format!("{}.backup-{}.json", stem, timestamp))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn to_json_4space<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// 同じディレクトリの一時ファイルに書いてから置き換える
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
