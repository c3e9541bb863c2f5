//! ロゴ加工パイプラインの結合テスト

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use mockup_common::{JobManifest, PrintMethod, TargetSize};
use mockup_kit::pipeline::{BackgroundMatting, LogoPipeline, PipelineStep};
use std::path::Path;
use tempfile::tempdir;

/// 白地に赤い四角のロゴ
fn write_logo(path: &Path) {
    let img = RgbImage::from_fn(300, 300, |x, y| {
        if (100..200).contains(&x) && (100..200).contains(&y) {
            Rgb([220, 20, 30])
        } else {
            Rgb([255, 255, 255])
        }
    });
    img.save(path).unwrap();
}

fn job(method: PrintMethod) -> JobManifest {
    JobManifest::new("acme-001", method, TargetSize { w: 1.0, h: 1.0, ..Default::default() })
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// DTF: 下地付きで最後まで処理し、作業ファイルは残らない
#[test]
fn test_process_dtf_job() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("acme.png");
    write_logo(&input);
    let temp = dir.path().join("temp");
    let pipeline = LogoPipeline::new(dir.path().join("out"), &temp).unwrap();

    let report = pipeline.process(&input, &job(PrintMethod::Dtf));

    assert!(report.success, "failures: {:?}", report.step_failures);
    assert!(report.error.is_none());
    assert!(report.underbase_generated);
    let final_path = report.final_path.expect("最終ファイルがありません");
    assert_eq!(final_path.file_name().unwrap(), "acme-001_final.png");
    assert!(final_path.exists());
    assert_eq!(files_in(&temp), 0);

    // 背景が透過になっている
    let out = image::open(&final_path).unwrap().to_rgba8();
    assert_eq!(out.get_pixel(0, 0)[3], 0);
    assert_eq!(out.get_pixel(150, 150)[3], 255);

    let validation = report.validation.unwrap();
    assert!(validation.passed);
    assert!((report.analysis.unwrap().effective_ppi - 300.0).abs() < 1e-9);
}

/// スクリーン印刷は下地を作らない
#[test]
fn test_process_screen_print_without_underbase() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("acme.jpg");
    DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 300, Rgb([255, 255, 255])))
        .save(&input)
        .unwrap();
    let pipeline = LogoPipeline::new(dir.path().join("out"), dir.path().join("temp")).unwrap();

    let report = pipeline.process(&input, &job(PrintMethod::ScreenPrint));

    assert!(!report.underbase_generated);
    assert!(report.final_path.is_some());
}

struct BrokenMatting;

impl BackgroundMatting for BrokenMatting {
    fn matte(&self, _image: &DynamicImage) -> Result<RgbaImage, String> {
        Err("model unavailable".into())
    }
}

/// 背景除去の失敗はパススルーされ、レポートに残る
#[test]
fn test_failed_step_passes_through() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("acme.png");
    write_logo(&input);
    let pipeline = LogoPipeline::new(dir.path().join("out"), dir.path().join("temp"))
        .unwrap()
        .with_matting(Box::new(BrokenMatting));

    let report = pipeline.process(&input, &job(PrintMethod::Dtf));

    assert!(report.success);
    assert_eq!(report.step_failures.len(), 1);
    assert_eq!(report.step_failures[0].step, PipelineStep::RemoveBackground);
    assert!(report.step_failures[0].reason.contains("model unavailable"));

    // 背景は残ったまま
    let out = image::open(report.final_path.unwrap()).unwrap().to_rgba8();
    assert_eq!(out.get_pixel(0, 0)[3], 255);
}

/// 入力がなければ失敗レポート
#[test]
fn test_missing_input() {
    let dir = tempdir().expect("Failed to create temp dir");
    let pipeline = LogoPipeline::new(dir.path().join("out"), dir.path().join("temp")).unwrap();

    let report = pipeline.process(&dir.path().join("missing.png"), &job(PrintMethod::Dtf));

    assert!(!report.success);
    assert!(report.final_path.is_none());
    assert!(report.error.unwrap().starts_with("Input not found"));
}

/// 不正なジョブは処理しない
#[test]
fn test_invalid_job_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("acme.png");
    write_logo(&input);
    let pipeline = LogoPipeline::new(dir.path().join("out"), dir.path().join("temp")).unwrap();
    let bad = JobManifest::new("bad", PrintMethod::Dtf, TargetSize { w: 0.0, h: 1.0, ..Default::default() });

    let report = pipeline.process(&input, &bad);

    assert!(!report.success);
    assert!(report.error.is_some());
    assert!(report.analysis.is_none());
}
