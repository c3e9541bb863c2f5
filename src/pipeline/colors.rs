//! 印刷方式に応じた色の正規化
//!
//! スクリーン印刷は k-means で版数まで減色、それ以外は 8 段階に丸める。
//! アルファは保持し、色は白背景に合成した値で扱う。

use super::{temp_output, PipelineStep, StepError};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use mockup_common::{JobManifest, LogoAnalysis, PrintMethod};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const KMEANS_MAX_ITERATIONS: usize = 20;
const ROUNDING_STEP: u8 = 8;

/// 色を正規化して作業ファイルに保存
pub fn normalize_colors(
    input: &Path,
    job: &JobManifest,
    analysis: &LogoAnalysis,
    temp_dir: &Path,
) -> Result<Option<PathBuf>, StepError> {
    let step = PipelineStep::NormalizeColors;
    let img = image::open(input).map_err(StepError::at(step))?;
    let has_alpha = img.color().has_alpha();
    let rgba = img.to_rgba8();
    let rgb = composite_on_white(&rgba);

    let reduced = if job.method == PrintMethod::ScreenPrint {
        quantize_kmeans(&rgb, screen_cluster_count(job.options.max_colors_screen, analysis.unique_colors))
    } else {
        round_levels(&rgb)
    };

    let output = temp_output(temp_dir, "color_norm", input);
    if has_alpha {
        let restored = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let c = reduced.get_pixel(x, y);
            Rgba([c[0], c[1], c[2], rgba.get_pixel(x, y)[3]])
        });
        restored.save_with_format(&output, image::ImageFormat::Png)
    } else {
        reduced.save_with_format(&output, image::ImageFormat::Png)
    }
    .map_err(StepError::at(step))?;

    Ok(Some(output))
}

/// スクリーン印刷の版数: 上限と実際の色数の小さい方（最低1）
pub fn screen_cluster_count(max_colors: usize, unique_colors: usize) -> usize {
    max_colors.min(unique_colors).max(1)
}

/// 白背景にアルファ合成
fn composite_on_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        let a = p[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

/// 各チャンネルを 8 の倍数に切り捨て
pub fn round_levels(rgb: &RgbImage) -> RgbImage {
    let mut out = rgb.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p[c] = (p[c] / ROUNDING_STEP) * ROUNDING_STEP;
        }
    }
    out
}

/// k-means で k 色以下に減色
///
/// 色ヒストグラムを重み付きで扱う。初期値は最頻色から始めて最遠点を順に追加するので
/// 結果は決定的。
pub fn quantize_kmeans(rgb: &RgbImage, k: usize) -> RgbImage {
    let mut histogram: HashMap<[u8; 3], u64> = HashMap::new();
    for p in rgb.pixels() {
        *histogram.entry(p.0).or_insert(0) += 1;
    }
    let mut colors: Vec<([f64; 3], u64)> = histogram
        .into_iter()
        .map(|(c, n)| ([c[0] as f64, c[1] as f64, c[2] as f64], n))
        .collect();
    // 初期値を決定的にするため並べ替える
    colors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)));

    let centers = kmeans(&colors, k);
    let palette: HashMap<[u8; 3], [u8; 3]> = colors
        .iter()
        .map(|(c, _)| {
            let key = [c[0] as u8, c[1] as u8, c[2] as u8];
            let center = centers[nearest(c, &centers)];
            (key, [center[0].round() as u8, center[1].round() as u8, center[2].round() as u8])
        })
        .collect();

    let mut out = rgb.clone();
    for p in out.pixels_mut() {
        if let Some(mapped) = palette.get(&p.0) {
            p.0 = *mapped;
        }
    }
    out
}

fn distance_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|i| (a[i] - b[i]).powi(2)).sum()
}

fn nearest(color: &[f64; 3], centers: &[[f64; 3]]) -> usize {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance_sq(color, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn kmeans(colors: &[([f64; 3], u64)], k: usize) -> Vec<[f64; 3]> {
    if colors.is_empty() {
        return vec![[255.0; 3]];
    }
    let k = k.min(colors.len()).max(1);

    let mut centers = vec![colors[0].0];
    while centers.len() < k {
        let farthest = colors
            .iter()
            .map(|(c, _)| (c, centers.iter().map(|m| distance_sq(c, m)).fold(f64::INFINITY, f64::min)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        match farthest {
            Some((c, d)) if d > 0.0 => centers.push(*c),
            _ => break,
        }
    }

    for _ in 0..KMEANS_MAX_ITERATIONS {
        let assignment: Vec<usize> = colors.par_iter().map(|(c, _)| nearest(c, &centers)).collect();

        let mut sums = vec![[0f64; 3]; centers.len()];
        let mut weights = vec![0u64; centers.len()];
        for ((c, n), &idx) in colors.iter().zip(&assignment) {
            for i in 0..3 {
                sums[idx][i] += c[i] * *n as f64;
            }
            weights[idx] += n;
        }

        let mut moved = false;
        for (j, center) in centers.iter_mut().enumerate() {
            if weights[j] == 0 {
                continue;
            }
            let updated = [
                sums[j][0] / weights[j] as f64,
                sums[j][1] / weights[j] as f64,
                sums[j][2] / weights[j] as f64,
            ];
            if distance_sq(&updated, center) > 1e-6 {
                moved = true;
            }
            *center = updated;
        }
        if !moved {
            break;
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_round_levels() {
        let img = RgbImage::from_pixel(1, 1, Rgb([7, 8, 255]));
        assert_eq!(round_levels(&img).get_pixel(0, 0).0, [0, 8, 248]);
    }

    #[test]
    fn test_kmeans_reduces_to_k_colors() {
        let img = RgbImage::from_fn(30, 10, |x, _| match x / 10 {
            0 => Rgb([250 - (x % 3) as u8, 0, 0]),
            1 => Rgb([0, 250 - (x % 3) as u8, 0]),
            _ => Rgb([0, 0, 250 - (x % 3) as u8]),
        });
        let reduced = quantize_kmeans(&img, 3);
        let colors: HashSet<[u8; 3]> = reduced.pixels().map(|p| p.0).collect();
        assert_eq!(colors.len(), 3);
        assert_eq!(reduced.get_pixel(0, 0).0, [249, 0, 0]);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
        assert_eq!(quantize_kmeans(&img, 4), quantize_kmeans(&img, 4));
    }

    #[test]
    fn test_screen_cluster_count() {
        assert_eq!(screen_cluster_count(6, 3), 3);
        assert_eq!(screen_cluster_count(6, 0), 1);
        assert_eq!(screen_cluster_count(6, 10), 6);
    }

    #[test]
    fn test_screen_print_keeps_few_colors() {
        let dir = std::env::temp_dir().join("mockup-kit-colors-screen");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("logo.png");
        RgbImage::from_fn(30, 10, |x, _| match x / 10 {
            0 => Rgb([200, 30, 30]),
            1 => Rgb([30, 200, 30]),
            _ => Rgb([30, 30, 200]),
        })
        .save(&input)
        .unwrap();

        let job = JobManifest::new("job", PrintMethod::ScreenPrint, Default::default());
        let analysis = LogoAnalysis { unique_colors: 3, ..LogoAnalysis::fallback() };
        let output = normalize_colors(&input, &job, &analysis, &dir).unwrap().unwrap();
        let img = image::open(&output).unwrap().to_rgb8();
        let colors: HashSet<[u8; 3]> = img.pixels().map(|p| p.0).collect();
        assert!(colors.len() <= 3);
        assert_eq!(img.get_pixel(0, 0).0, [200, 30, 30]);
    }

    #[test]
    fn test_composite_on_white() {
        let rgba = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { Rgba([0, 0, 0, 0]) } else { Rgba([0, 0, 0, 255]) });
        let rgb = composite_on_white(&rgba);
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_alpha_preserved() {
        let dir = std::env::temp_dir().join("mockup-kit-colors-alpha");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("logo.png");
        RgbaImage::from_fn(4, 4, |x, _| Rgba([13, 77, 200, if x < 2 { 0 } else { 255 }]))
            .save(&input)
            .unwrap();

        let job = JobManifest::new("job", PrintMethod::Dtf, Default::default());
        let output = normalize_colors(&input, &job, &LogoAnalysis::fallback(), &dir).unwrap().unwrap();
        let img = image::open(&output).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(3, 0).0, [8, 72, 200, 255]);
    }
}
