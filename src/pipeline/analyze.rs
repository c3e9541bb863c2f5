//! ロゴ画像の解析

use super::{PipelineStep, StepError};
use image::{GrayImage, RgbImage};
use mockup_common::{LogoAnalysis, LogoType, RecommendedPath, TargetSize};
use std::collections::HashSet;
use std::path::Path;

/// 色数の判定前にかけるぼかし
const COLOR_MERGE_SIGMA: f32 = 0.8;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const FLAT_MAX_COLORS: usize = 12;
const FLAT_MIN_EDGE_DENSITY: f64 = 0.01;
const FLAT_MAX_LAPLACIAN_VAR: f64 = 500.0;
const JPEG_MAX_LAPLACIAN_VAR: f64 = 100.0;
const PHOTO_MIN_COLORS: usize = 50;
const VECTOR_MAX_PPI: f64 = 300.0;
const VECTOR_MAX_STROKE_PT: f64 = 0.75;

/// 画像を解析する
pub fn analyze_logo(path: &Path, target: &TargetSize) -> Result<LogoAnalysis, StepError> {
    let img = image::open(path).map_err(StepError::at(PipelineStep::Analyze))?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(StepError::new(PipelineStep::Analyze, "empty image"));
    }

    let has_transparency = img.color().has_alpha();
    let effective_ppi = target.effective_ppi(width, height);

    let alpha_percentage = if has_transparency {
        let rgba = img.to_rgba8();
        let translucent = rgba.pixels().filter(|p| p[3] < 255).count();
        100.0 * translucent as f64 / rgba.pixels().len() as f64
    } else {
        0.0
    };

    let rgb = img.to_rgb8();
    let unique_colors = count_unique_colors(&image::imageops::blur(&rgb, COLOR_MERGE_SIGMA));
    let color_entropy = mean_channel_variance(&rgb);

    let gray = image::imageops::grayscale(&rgb);
    let edges = imageproc::edges::canny(&gray, CANNY_LOW, CANNY_HIGH);
    let edge_density = edges.pixels().filter(|p| p[0] > 0).count() as f64 / (width as f64 * height as f64);
    let lap_var = laplacian_variance(&gray);

    let is_flat_logo =
        unique_colors <= FLAT_MAX_COLORS && edge_density > FLAT_MIN_EDGE_DENSITY && lap_var < FLAT_MAX_LAPLACIAN_VAR;

    let is_jpeg = path
        .extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            e == "jpg" || e == "jpeg"
        })
        .unwrap_or(false);
    let has_jpeg_artifacts = is_jpeg && lap_var < JPEG_MAX_LAPLACIAN_VAR;

    let min_stroke_width_pt = if is_flat_logo {
        min_stroke_pt(&gray, effective_ppi).unwrap_or(1.0)
    } else {
        1.0
    };

    let logo_type = if is_flat_logo {
        LogoType::Flat
    } else if unique_colors > PHOTO_MIN_COLORS {
        LogoType::Photographic
    } else {
        LogoType::Raster
    };

    let recommended_path = if is_flat_logo && (effective_ppi < VECTOR_MAX_PPI || min_stroke_width_pt < VECTOR_MAX_STROKE_PT) {
        RecommendedPath::Vector
    } else {
        RecommendedPath::Raster
    };

    let mut quality_issues = Vec::new();
    if effective_ppi < 200.0 {
        quality_issues.push("Low resolution for target size".to_string());
    }
    if has_jpeg_artifacts {
        quality_issues.push("JPEG compression artifacts detected".to_string());
    }
    if min_stroke_width_pt < 0.5 {
        quality_issues.push("Thin strokes may not print well".to_string());
    }
    if unique_colors > 8 {
        quality_issues.push("High color count for screen printing".to_string());
    }

    Ok(LogoAnalysis {
        logo_type,
        has_transparency,
        alpha_percentage,
        effective_ppi,
        unique_colors,
        color_entropy,
        is_flat_logo,
        has_jpeg_artifacts,
        min_stroke_width_pt,
        text_confidence: 0.0,
        recommended_path,
        quality_issues,
    })
}

fn count_unique_colors(rgb: &RgbImage) -> usize {
    rgb.pixels().map(|p| p.0).collect::<HashSet<[u8; 3]>>().len()
}

/// チャンネルごとの分散の平均
fn mean_channel_variance(rgb: &RgbImage) -> f64 {
    let n = rgb.pixels().len() as f64;
    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    for p in rgb.pixels() {
        for c in 0..3 {
            let v = p[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }
    (0..3)
        .map(|c| {
            let mean = sum[c] / n;
            sum_sq[c] / n - mean * mean
        })
        .sum::<f64>()
        / 3.0
}

/// 4近傍ラプラシアンの分散（境界は端の画素を延長）
pub(crate) fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let at = |x: i64, y: i64| gray.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[0] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h {
        for x in 0..w {
            let v = at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4.0 * at(x, y);
            sum += v;
            sum_sq += v * v;
        }
    }
    let n = (w * h) as f64;
    let mean = sum / n;
    sum_sq / n - mean * mean
}

/// 最も細い線の太さ（pt）
///
/// 明るい画素（>127）を前景とし、背景までの距離の最小値を pt に換算する。
fn min_stroke_pt(gray: &GrayImage, effective_ppi: f64) -> Option<f64> {
    if effective_ppi <= 0.0 {
        return None;
    }
    // 背景を非ゼロにして、各画素から背景までの距離を測る
    let background = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        image::Luma([if gray.get_pixel(x, y)[0] > 127 { 0 } else { 255 }])
    });
    let dist_sq = imageproc::distance_transform::euclidean_squared_distance_transform(&background);

    let min_px = dist_sq
        .pixels()
        .map(|p| p[0])
        .filter(|d| d.is_finite() && *d > 0.0)
        .fold(f64::INFINITY, f64::min);

    if !min_px.is_finite() {
        return None;
    }
    Some((min_px.sqrt() * 72.0 / effective_ppi).max(0.5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("mockup-kit-analyze");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    /// 幅25pxの縦縞（2色・境界3本）
    fn stripes(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if (x / 25) % 2 == 0 {
                Rgb([60, 60, 60])
            } else {
                Rgb([145, 145, 145])
            }
        })
    }

    #[test]
    fn test_flat_logo_detected() {
        let path = temp_path("flat.png");
        stripes(100, 50).save(&path).unwrap();

        let target = TargetSize { w: 2.0, h: 1.0, ..Default::default() };
        let analysis = analyze_logo(&path, &target).unwrap();

        assert!(!analysis.has_transparency);
        assert!((analysis.effective_ppi - 50.0).abs() < 1e-9);
        assert!(analysis.unique_colors <= 12);
        assert!(analysis.is_flat_logo);
        assert_eq!(analysis.logo_type, LogoType::Flat);
        assert_eq!(analysis.recommended_path, RecommendedPath::Vector);
        assert!(analysis.quality_issues.contains(&"Low resolution for target size".to_string()));
        assert!((analysis.min_stroke_width_pt - 72.0 / 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_transparency_percentage() {
        let path = temp_path("alpha.png");
        let img = RgbaImage::from_fn(10, 10, |x, _| if x < 5 { Rgba([0, 0, 0, 0]) } else { Rgba([0, 0, 0, 255]) });
        img.save(&path).unwrap();

        let analysis = analyze_logo(&path, &TargetSize::default()).unwrap();
        assert!(analysis.has_transparency);
        assert!((analysis.alpha_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_step_error() {
        let err = analyze_logo(Path::new("/nonexistent/logo.png"), &TargetSize::default()).unwrap_err();
        assert_eq!(err.step, PipelineStep::Analyze);
    }

    #[test]
    fn test_laplacian_variance_of_constant_is_zero() {
        let gray = GrayImage::from_pixel(8, 8, image::Luma([128]));
        assert_eq!(laplacian_variance(&gray), 0.0);
    }
}
