//! 解像度不足時の拡大

use super::{temp_output, PipelineStep, StepError};
use image::imageops::FilterType;
use mockup_common::{LogoAnalysis, LogoType};
use std::path::{Path, PathBuf};

/// 拡大後の一辺の上限
const MAX_OUTPUT_SIDE: u32 = 12_000;
const SHARPEN_MIN_FACTOR: f64 = 1.5;
const SHARPEN_SIGMA: f32 = 1.0;
const SHARPEN_THRESHOLD: i32 = 3;

/// 拡大後のサイズ（上限を超える場合は縦横比を保って縮める）
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let mut w = (width as f64 * factor).round().max(1.0);
    let mut h = (height as f64 * factor).round().max(1.0);
    let longest = w.max(h);
    if longest > MAX_OUTPUT_SIDE as f64 {
        let shrink = MAX_OUTPUT_SIDE as f64 / longest;
        w = (w * shrink).floor().max(1.0);
        h = (h * shrink).floor().max(1.0);
    }
    (w as u32, h as u32)
}

/// 目標 DPI まで拡大する（足りていれば `None`）
///
/// フラットなロゴは輪郭を保つため最近傍、それ以外は Lanczos。
pub fn upscale_logo(
    input: &Path,
    analysis: &LogoAnalysis,
    target_ppi: u32,
    temp_dir: &Path,
) -> Result<Option<PathBuf>, StepError> {
    let step = PipelineStep::Upscale;
    let current = analysis.effective_ppi;
    if current <= 0.0 {
        return Err(StepError::new(step, format!("invalid effective ppi {}", current)));
    }
    if current >= target_ppi as f64 {
        return Ok(None);
    }

    let img = image::open(input).map_err(StepError::at(step))?;
    let factor = target_ppi as f64 / current;
    let (w, h) = scaled_dimensions(img.width(), img.height(), factor);

    let filter = if analysis.is_flat_logo || analysis.logo_type == LogoType::Flat {
        FilterType::Nearest
    } else {
        FilterType::Lanczos3
    };
    let mut upscaled = img.resize_exact(w, h, filter);

    if factor > SHARPEN_MIN_FACTOR {
        upscaled = upscaled.unsharpen(SHARPEN_SIGMA, SHARPEN_THRESHOLD);
    }

    let output = temp_output(temp_dir, "upscaled", input);
    upscaled.save_with_format(&output, image::ImageFormat::Png).map_err(StepError::at(step))?;
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(100, 50, 3.0), (300, 150));
        assert_eq!(scaled_dimensions(10_000, 5_000, 3.0), (12_000, 6_000));
    }

    #[test]
    fn test_skip_when_resolution_is_enough() {
        let analysis = LogoAnalysis { effective_ppi: 320.0, ..LogoAnalysis::fallback() };
        let result = upscale_logo(Path::new("/nonexistent.png"), &analysis, 300, Path::new("/tmp")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_upscale_flat_keeps_edges() {
        let dir = std::env::temp_dir().join("mockup-kit-upscale");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("flat.png");
        RgbaImage::from_fn(4, 2, |x, _| if x < 2 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) })
            .save(&input)
            .unwrap();

        let analysis = LogoAnalysis {
            effective_ppi: 100.0,
            is_flat_logo: true,
            logo_type: LogoType::Flat,
            ..LogoAnalysis::fallback()
        };
        let output = upscale_logo(&input, &analysis, 150, &dir).unwrap().unwrap();
        let img = image::open(&output).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (6, 3));
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(5, 0)[0], 255);
    }
}
