//! ロゴ解析結果（パイプラインの中間結果）

use serde::{Deserialize, Serialize};

/// ロゴ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoType {
    Vector,
    Raster,
    Flat,
    Photographic,
}

/// 推奨する加工経路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedPath {
    Vector,
    Raster,
}

/// 1枚の入力画像の解析スナップショット（読み取り専用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoAnalysis {
    pub logo_type: LogoType,
    pub has_transparency: bool,
    pub alpha_percentage: f64,
    pub effective_ppi: f64,
    pub unique_colors: usize,
    /// チャンネル分散の平均（簡易エントロピー）
    pub color_entropy: f64,
    pub is_flat_logo: bool,
    pub has_jpeg_artifacts: bool,
    pub min_stroke_width_pt: f64,
    pub text_confidence: f64,
    pub recommended_path: RecommendedPath,
    pub quality_issues: Vec<String>,
}

impl LogoAnalysis {
    /// 解析失敗時の保守的な既定値
    pub fn fallback() -> Self {
        Self {
            logo_type: LogoType::Raster,
            has_transparency: false,
            alpha_percentage: 0.0,
            effective_ppi: 72.0,
            unique_colors: 256,
            color_entropy: 100.0,
            is_flat_logo: false,
            has_jpeg_artifacts: false,
            min_stroke_width_pt: 1.0,
            text_confidence: 0.0,
            recommended_path: RecommendedPath::Raster,
            quality_issues: vec!["Analysis failed".to_string()],
        }
    }
}
