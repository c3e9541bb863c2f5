//! 商品画像へのロゴ合成

use super::table::MockupConfig;
use crate::catalog::file_name_of;
use crate::error::{MockupError, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use mockup_common::BoundingBox;
use std::path::{Path, PathBuf};
use tracing::warn;

/// ロゴを枠内に縦横比を保って収めたサイズと左上位置
pub fn fit_in_box(logo_w: u32, logo_h: u32, bbox: &BoundingBox) -> ((u32, u32), (i64, i64)) {
    let w = bbox.width().max(1) as f64;
    let h = bbox.height().max(1) as f64;
    let scale = (w / logo_w.max(1) as f64).min(h / logo_h.max(1) as f64);
    let new_w = ((logo_w as f64 * scale) as u32).max(1);
    let new_h = ((logo_h as f64 * scale) as u32).max(1);

    let offset_x = bbox.x1 + ((w as i64 - new_w as i64) / 2).max(0);
    let offset_y = bbox.y1 + ((h as i64 - new_h as i64) / 2).max(0);
    ((new_w, new_h), (offset_x, offset_y))
}

/// 1枚を合成する（最初のボックスのみ使用）
pub fn composite(base: &RgbaImage, logo: &RgbaImage, bbox: &BoundingBox) -> RgbaImage {
    let ((w, h), (x, y)) = fit_in_box(logo.width(), logo.height(), bbox);
    let resized = image::imageops::resize(logo, w, h, FilterType::Lanczos3);
    let mut out = base.clone();
    image::imageops::overlay(&mut out, &resized, x, y);
    out
}

/// 出力ファイル名: 対象が1件なら元の名前、複数なら `<stem>_mockup.png`
pub fn output_name(image_file: &str, single_target: bool) -> String {
    let base = file_name_of(Path::new(image_file));
    if single_target {
        return base;
    }
    let stem = Path::new(&base)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or(base);
    format!("{}_mockup.png", stem)
}

fn is_jpeg_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// 全対象を合成して `out_dir` と `preview_dir` に書き出す
///
/// 開けない商品画像は警告してスキップする。
pub fn render_mockups(
    logo_path: &Path,
    products_dir: &Path,
    config: &MockupConfig,
    out_dir: &Path,
    preview_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let logo = image::open(logo_path)
        .map_err(|e| MockupError::ImageLoad(format!("{}: {}", logo_path.display(), e)))?
        .to_rgba8();

    std::fs::create_dir_all(out_dir)?;
    std::fs::create_dir_all(preview_dir)?;
    let single_target = config.len() == 1;
    let mut written = Vec::new();

    for (image_file, labels) in config {
        let Some(bbox) = labels.boxes.first() else {
            continue;
        };
        let base_path = products_dir.join(image_file);
        let base = match image::open(&base_path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!("商品画像を開けないためスキップ {}: {}", base_path.display(), e);
                continue;
            }
        };

        let result = composite(&base, &logo, bbox);
        let name = output_name(image_file, single_target);
        let out_path = out_dir.join(&name);
        if is_jpeg_name(&name) {
            image::DynamicImage::ImageRgba8(result)
                .to_rgb8()
                .save_with_format(&out_path, image::ImageFormat::Jpeg)?;
        } else {
            result.save_with_format(&out_path, image::ImageFormat::Png)?;
        }
        std::fs::copy(&out_path, preview_dir.join(&name))?;
        written.push(out_path);
    }
    Ok(written)
}
