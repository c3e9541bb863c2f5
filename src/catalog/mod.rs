//! 画像カタログ
//!
//! ルート以下の画像ファイルを決定的な順序で列挙する。

use crate::error::{MockupError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// 拡張子が対象画像か（大文字小文字を区別しない）
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// 画像を再帰的に列挙（重複除去・辞書順）
///
/// ルートが画像ファイルそのものなら1件のカタログになる。
pub fn scan_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(MockupError::FolderNotFound(root.display().to_string()));
    }

    if root.is_file() {
        return Ok(if is_image_path(root) { vec![root.to_path_buf()] } else { Vec::new() });
    }

    let images: BTreeSet<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image_path(p))
        .collect();

    Ok(images.into_iter().collect())
}

/// ラベルファイルのキーとなるファイル名
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
