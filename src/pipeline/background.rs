//! 背景除去
//!
//! 実装は `BackgroundMatting` で差し替えられる。既定は四隅の平均色を背景とみなす推定。

use super::{temp_output, PipelineStep, StepError};
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};

/// 背景との色距離がこれを超える画素を前景とする
const FOREGROUND_DISTANCE: f64 = 30.0;

/// 背景除去の実装
pub trait BackgroundMatting {
    /// アルファ付き画像を返す
    fn matte(&self, image: &DynamicImage) -> Result<RgbaImage, String>;
}

/// 四隅の平均色との距離で前景を決める
#[derive(Debug, Clone, Copy)]
pub struct CornerColorMatting {
    pub threshold: f64,
}

impl Default for CornerColorMatting {
    fn default() -> Self {
        Self { threshold: FOREGROUND_DISTANCE }
    }
}

impl BackgroundMatting for CornerColorMatting {
    fn matte(&self, image: &DynamicImage) -> Result<RgbaImage, String> {
        let rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();
        if w == 0 || h == 0 {
            return Err("empty image".into());
        }

        let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];
        let mut bg = [0f64; 3];
        for &(x, y) in &corners {
            let p = rgb.get_pixel(x, y);
            for c in 0..3 {
                bg[c] += p[c] as f64 / corners.len() as f64;
            }
        }

        Ok(RgbaImage::from_fn(w, h, |x, y| {
            let p = rgb.get_pixel(x, y);
            let dist = (0..3)
                .map(|c| (p[c] as f64 - bg[c]).powi(2))
                .sum::<f64>()
                .sqrt();
            let alpha = if dist > self.threshold { 255 } else { 0 };
            image::Rgba([p[0], p[1], p[2], alpha])
        }))
    }
}

/// 背景を除去して作業ファイルに保存
///
/// 既にアルファを持つ画像はそのまま（`None`）。
pub fn remove_background(
    matting: &dyn BackgroundMatting,
    input: &Path,
    temp_dir: &Path,
) -> Result<Option<PathBuf>, StepError> {
    let step = PipelineStep::RemoveBackground;
    let img = image::open(input).map_err(StepError::at(step))?;
    if img.color().has_alpha() {
        return Ok(None);
    }

    let matted = matting.matte(&img).map_err(StepError::at(step))?;
    let output = temp_output(temp_dir, "bg_removed", input);
    matted.save_with_format(&output, image::ImageFormat::Png).map_err(StepError::at(step))?;
    Ok(Some(output))
}
