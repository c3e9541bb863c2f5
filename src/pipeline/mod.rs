//! ロゴ加工パイプライン
//!
//! 解析 → 背景除去 → 拡大 → 色の正規化 → 下地生成 → 品質判定 の順に処理する。
//! 各ステップは `Result<_, StepError>` を返し、失敗したステップは入力をそのまま
//! 次へ渡す（パススルー）。失敗内容はレポートに残す。

pub mod analyze;
pub mod background;
pub mod colors;
pub mod underbase;
pub mod upscale;

pub use analyze::analyze_logo;
pub use background::{BackgroundMatting, CornerColorMatting};

use crate::config::Config;
use crate::error::Result;
use crate::scraper::Scraper;
use mockup_common::{validate, JobManifest, LogoAnalysis, ScrapeOutcome, ValidationReport};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// パイプラインのステップ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Analyze,
    RemoveBackground,
    Upscale,
    NormalizeColors,
    Underbase,
    Finalize,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Analyze => "analyze",
            PipelineStep::RemoveBackground => "remove_background",
            PipelineStep::Upscale => "upscale",
            PipelineStep::NormalizeColors => "normalize_colors",
            PipelineStep::Underbase => "underbase",
            PipelineStep::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// ステップの失敗
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{step}: {reason}")]
pub struct StepError {
    pub step: PipelineStep,
    pub reason: String,
}

impl StepError {
    pub fn new(step: PipelineStep, reason: impl fmt::Display) -> Self {
        Self { step, reason: reason.to_string() }
    }

    /// エラーを指定ステップの失敗に変換するクロージャ
    pub fn at<E: fmt::Display>(step: PipelineStep) -> impl Fn(E) -> StepError {
        move |e| StepError::new(step, e)
    }
}

/// レポートに残す失敗記録
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: PipelineStep,
    pub reason: String,
}

impl From<StepError> for StepFailure {
    fn from(e: StepError) -> Self {
        Self { step: e.step, reason: e.reason }
    }
}

/// 1ジョブの処理結果
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub job_id: String,
    pub input_path: PathBuf,
    pub final_path: Option<PathBuf>,
    pub analysis: Option<LogoAnalysis>,
    pub validation: Option<ValidationReport>,
    pub step_failures: Vec<StepFailure>,
    pub underbase_generated: bool,
    pub processing_time_secs: f64,
    pub success: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_result: Option<ScrapeOutcome>,
}

impl ProcessReport {
    fn new(job: &JobManifest, input: &Path) -> Self {
        Self {
            job_id: job.job_id.clone(),
            input_path: input.to_path_buf(),
            final_path: None,
            analysis: None,
            validation: None,
            step_failures: Vec::new(),
            underbase_generated: false,
            processing_time_secs: 0.0,
            success: false,
            error: None,
            scrape_result: None,
        }
    }

    /// 取得に失敗したときのレポート
    pub fn scrape_failed(job: &JobManifest, outcome: ScrapeOutcome) -> Self {
        let mut report = Self::new(job, Path::new(""));
        report.error = Some(format!(
            "Failed to scrape logo: {}",
            outcome.error.as_deref().unwrap_or("Unknown error")
        ));
        report.scrape_result = Some(outcome);
        report
    }
}

/// ロゴ加工パイプライン
pub struct LogoPipeline {
    output_dir: PathBuf,
    temp_dir: PathBuf,
    matting: Box<dyn BackgroundMatting + Send + Sync>,
}

impl LogoPipeline {
    /// 出力先・作業先を作成して初期化（背景除去は四隅色の推定）
    pub fn new(output_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        let temp_dir = temp_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        std::fs::create_dir_all(&temp_dir)?;
        Ok(Self { output_dir, temp_dir, matting: Box::new(CornerColorMatting::default()) })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.pipeline_output_dir, &config.pipeline_temp_dir)
    }

    /// 背景除去の実装を差し替える
    pub fn with_matting(mut self, matting: Box<dyn BackgroundMatting + Send + Sync>) -> Self {
        self.matting = matting;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 1枚を最後まで処理する
    pub fn process(&self, input: &Path, job: &JobManifest) -> ProcessReport {
        let started = Instant::now();
        let mut report = ProcessReport::new(job, input);
        info!("ジョブ {} の処理開始: {}", job.job_id, input.display());

        if let Err(e) = job.validate() {
            report.error = Some(e.to_string());
            report.processing_time_secs = started.elapsed().as_secs_f64();
            return report;
        }
        if !input.is_file() {
            report.error = Some(format!("Input not found: {}", input.display()));
            report.processing_time_secs = started.elapsed().as_secs_f64();
            return report;
        }

        // 1. 解析
        let analysis = match analyze_logo(input, &job.target_size_in) {
            Ok(a) => a,
            Err(e) => {
                warn!("解析に失敗したため既定値を使用: {}", e);
                report.step_failures.push(e.into());
                LogoAnalysis::fallback()
            }
        };

        let mut current = input.to_path_buf();
        let mut intermediates: Vec<PathBuf> = Vec::new();

        // 2. 背景除去
        if !analysis.has_transparency {
            let step = background::remove_background(self.matting.as_ref(), &current, &self.temp_dir);
            self.advance(step, &mut current, &mut intermediates, &mut report);
        }

        // 3. 拡大
        if analysis.effective_ppi < job.dpi_min as f64 {
            let step = upscale::upscale_logo(&current, &analysis, job.dpi_min, &self.temp_dir);
            self.advance(step, &mut current, &mut intermediates, &mut report);
        }

        // 4. 色の正規化
        let step = colors::normalize_colors(&current, job, &analysis, &self.temp_dir);
        self.advance(step, &mut current, &mut intermediates, &mut report);

        // 5. 下地
        if job.method.needs_underbase() {
            match underbase::generate_underbase(&current, job, &self.temp_dir) {
                Ok(path) => {
                    report.underbase_generated = true;
                    intermediates.push(path);
                }
                Err(e) => {
                    warn!("下地の生成に失敗: {}", e);
                    report.step_failures.push(e.into());
                }
            }
        }

        // 6. 品質判定
        let file_size = std::fs::metadata(&current).ok().map(|m| m.len());
        let validation = validate(&analysis, job, file_size);

        match self.finalize(&current, job) {
            Ok(final_path) => report.final_path = Some(final_path),
            Err(e) => {
                warn!("最終ファイルの書き出しに失敗: {}", e);
                report.error = Some(e.to_string());
                report.step_failures.push(e.into());
            }
        }

        for path in &intermediates {
            if Some(path) != report.final_path.as_ref() {
                let _ = std::fs::remove_file(path);
            }
        }

        report.success = validation.passed && report.final_path.is_some();
        report.processing_time_secs = started.elapsed().as_secs_f64();
        info!(
            "処理完了 {:.2}s - 品質スコア {}/100",
            report.processing_time_secs, validation.quality_score
        );
        report.analysis = Some(analysis);
        report.validation = Some(validation);
        report
    }

    /// ステップ結果を反映（失敗時は現在のファイルを維持）
    fn advance(
        &self,
        step: std::result::Result<Option<PathBuf>, StepError>,
        current: &mut PathBuf,
        intermediates: &mut Vec<PathBuf>,
        report: &mut ProcessReport,
    ) {
        match step {
            Ok(Some(next)) => {
                intermediates.push(next.clone());
                *current = next;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{} に失敗したためスキップ: {}", e.step, e.reason);
                report.step_failures.push(e.into());
            }
        }
    }

    /// `<job_id>_final.png` を出力
    fn finalize(&self, current: &Path, job: &JobManifest) -> std::result::Result<PathBuf, StepError> {
        let final_path = self.output_dir.join(format!("{}_final.png", job.job_id));
        let is_png = current
            .extension()
            .map(|e| e.eq_ignore_ascii_case("png"))
            .unwrap_or(false);

        if is_png {
            std::fs::copy(current, &final_path).map_err(StepError::at(PipelineStep::Finalize))?;
        } else {
            let img = image::open(current).map_err(StepError::at(PipelineStep::Finalize))?;
            img.save_with_format(&final_path, image::ImageFormat::Png)
                .map_err(StepError::at(PipelineStep::Finalize))?;
        }
        Ok(final_path)
    }
}

/// 作業ファイル名 `<prefix>_<stem>.png`
pub(crate) fn temp_output(temp_dir: &Path, prefix: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "logo".to_string());
    temp_dir.join(format!("{}_{}.png", prefix, stem))
}

/// サイトからロゴを取得して加工する
pub async fn scrape_and_process_logo(
    url: &str,
    job: &JobManifest,
    scraper: &Scraper,
    pipeline: &LogoPipeline,
) -> ProcessReport {
    let outcome = scraper.scrape_website(url).await;
    let Some(logo_path) = outcome.logo_path.clone() else {
        return ProcessReport::scrape_failed(job, outcome);
    };

    let mut report = pipeline.process(Path::new(&logo_path), job);
    report.scrape_result = Some(outcome);
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_output_name() {
        let path = temp_output(Path::new("/tmp/work"), "upscaled", Path::new("in/Acme_logo.jpg"));
        assert_eq!(path, PathBuf::from("/tmp/work/upscaled_Acme_logo.png"));
    }

    #[test]
    fn test_step_error_display() {
        let e = StepError::new(PipelineStep::Upscale, "out of memory");
        assert_eq!(e.to_string(), "upscale: out of memory");
        let failure: StepFailure = e.into();
        assert_eq!(failure.step, PipelineStep::Upscale);
    }

    #[test]
    fn test_scrape_failed_report() {
        let job = JobManifest::new("job-1", mockup_common::PrintMethod::Dtf, Default::default());
        let report = ProcessReport::scrape_failed(&job, ScrapeOutcome::failed("acme.example", "Request timeout"));
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("Failed to scrape logo: Request timeout"));
        assert!(report.scrape_result.is_some());
    }
}
