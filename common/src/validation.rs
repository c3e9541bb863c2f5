//! 本番投入前の品質ゲート
//!
//! スコアは100から開始し、ブロッキング問題1件につき25、警告1件につき5を減点する。

use crate::analysis::LogoAnalysis;
use crate::job::{JobManifest, PrintMethod};
use serde::{Deserialize, Serialize};

/// これ未満は印刷不可
pub const BLOCKING_PPI: f64 = 50.0;
/// これ未満は低解像度警告
pub const LOW_PPI: f64 = 100.0;
/// これ未満の線幅は印刷不可
pub const BLOCKING_STROKE_PT: f64 = 0.5;
/// これを超えるファイルは警告
pub const LARGE_FILE_BYTES: u64 = 50 * 1024 * 1024;

const ISSUE_PENALTY: u32 = 25;
const WARNING_PENALTY: u32 = 5;

/// 検証結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub quality_score: u32,
}

/// 解析結果・ジョブ・出力ファイルサイズから合否を判定
pub fn validate(analysis: &LogoAnalysis, job: &JobManifest, file_size_bytes: Option<u64>) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let ppi = analysis.effective_ppi;
    if ppi < BLOCKING_PPI {
        issues.push("Resolution too low for production".to_string());
    } else if ppi < LOW_PPI {
        warnings.push("Low resolution - consider higher quality source or smaller print size".to_string());
    } else if ppi < job.dpi_min as f64 {
        warnings.push(format!("Resolution below target {} PPI", job.dpi_min));
    }

    let stroke = analysis.min_stroke_width_pt;
    if stroke < BLOCKING_STROKE_PT {
        issues.push("Strokes too thin for reliable printing".to_string());
    } else if stroke < job.options.min_stroke_pt {
        warnings.push("Thin strokes may cause printing issues".to_string());
    }

    if job.method == PrintMethod::ScreenPrint && analysis.unique_colors > job.options.max_colors_screen {
        warnings.push("High color count for screen printing - consider DTF".to_string());
    }

    if file_size_bytes.is_some_and(|size| size > LARGE_FILE_BYTES) {
        warnings.push("Large file size may cause processing delays".to_string());
    }

    let penalty = issues.len() as u32 * ISSUE_PENALTY + warnings.len() as u32 * WARNING_PENALTY;

    ValidationReport {
        passed: issues.is_empty(),
        quality_score: 100u32.saturating_sub(penalty),
        issues,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{SizeLock, TargetSize};

    fn analysis(ppi: f64, stroke: f64) -> LogoAnalysis {
        LogoAnalysis {
            effective_ppi: ppi,
            min_stroke_width_pt: stroke,
            unique_colors: 4,
            quality_issues: Vec::new(),
            ..LogoAnalysis::fallback()
        }
    }

    fn dtf_job() -> JobManifest {
        JobManifest::new("t", PrintMethod::Dtf, TargetSize { w: 2.0, h: 1.0, lock: SizeLock::Max })
    }

    #[test]
    fn test_dpi_40_always_fails() {
        let report = validate(&analysis(40.0, 1.0), &dtf_job(), Some(1024));
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.quality_score, 75);
    }

    #[test]
    fn test_dpi_250_stroke_1pt_dtf_passes() {
        let report = validate(&analysis(250.0, 1.0), &dtf_job(), Some(1024));
        assert!(report.passed);
        assert!(report.issues.is_empty());
        // 既定の dpi_min=300 未満なので警告1件
        assert_eq!(report.warnings, vec!["Resolution below target 300 PPI".to_string()]);
        assert_eq!(report.quality_score, 95);
    }

    #[test]
    fn test_thin_stroke_blocks() {
        let report = validate(&analysis(400.0, 0.4), &dtf_job(), None);
        assert!(!report.passed);
        assert!(report.issues[0].contains("too thin"));
    }

    #[test]
    fn test_low_resolution_warning_band() {
        let report = validate(&analysis(80.0, 0.6), &dtf_job(), None);
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.quality_score, 90);
    }

    #[test]
    fn test_screen_print_color_warning_and_large_file() {
        let job = JobManifest::new("sp", PrintMethod::ScreenPrint, TargetSize::default()).with_dpi_min(100);
        let mut a = analysis(150.0, 1.0);
        a.unique_colors = 40;
        let report = validate(&a, &job, Some(LARGE_FILE_BYTES + 1));
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_score_combines_penalties() {
        let mut job = dtf_job();
        job.method = PrintMethod::ScreenPrint;
        let mut a = analysis(10.0, 0.1);
        a.unique_colors = 100;
        let report = validate(&a, &job, Some(u64::MAX));
        assert!(!report.passed);
        assert_eq!(report.quality_score, 40);
    }
}
