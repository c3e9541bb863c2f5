//! ジョブマニフェスト（加工パイプラインの入力）
//!
//! 1回の実行中は不変。`options` を省略した場合は既定値で補完する。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 印刷方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintMethod {
    #[serde(rename = "DTF")]
    Dtf,
    #[serde(rename = "DTG")]
    Dtg,
    #[serde(rename = "screen_print")]
    ScreenPrint,
    #[serde(rename = "sublimation")]
    Sublimation,
    #[serde(rename = "UV")]
    Uv,
    #[serde(rename = "vinyl")]
    Vinyl,
}

impl PrintMethod {
    /// 下地（白インク）が必要な方式か
    pub fn needs_underbase(&self) -> bool {
        matches!(self, PrintMethod::Dtf | PrintMethod::Dtg)
    }
}

impl std::str::FromStr for PrintMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "dtf" => Ok(PrintMethod::Dtf),
            "dtg" => Ok(PrintMethod::Dtg),
            "screen_print" | "screen" => Ok(PrintMethod::ScreenPrint),
            "sublimation" => Ok(PrintMethod::Sublimation),
            "uv" => Ok(PrintMethod::Uv),
            "vinyl" => Ok(PrintMethod::Vinyl),
            _ => Err(format!(
                "Unknown print method: {}. Use dtf, dtg, screen-print, sublimation, uv or vinyl",
                s
            )),
        }
    }
}

impl std::fmt::Display for PrintMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrintMethod::Dtf => write!(f, "DTF"),
            PrintMethod::Dtg => write!(f, "DTG"),
            PrintMethod::ScreenPrint => write!(f, "screen_print"),
            PrintMethod::Sublimation => write!(f, "sublimation"),
            PrintMethod::Uv => write!(f, "UV"),
            PrintMethod::Vinyl => write!(f, "vinyl"),
        }
    }
}

/// 目標サイズの固定方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeLock {
    /// 幅・高さの両方に収める
    #[default]
    Max,
    /// 幅を固定
    Width,
    /// 高さを固定
    Height,
}

impl std::str::FromStr for SizeLock {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(SizeLock::Max),
            "width" | "w" => Ok(SizeLock::Width),
            "height" | "h" => Ok(SizeLock::Height),
            _ => Err(format!("Unknown lock mode: {}. Use max, width or height", s)),
        }
    }
}

/// 印刷サイズ（インチ）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSize {
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub lock: SizeLock,
}

impl Default for TargetSize {
    fn default() -> Self {
        Self { w: 10.0, h: 10.0, lock: SizeLock::Max }
    }
}

impl TargetSize {
    /// 目標サイズで実現される解像度（ピクセル / インチ）
    pub fn effective_ppi(&self, width_px: u32, height_px: u32) -> f64 {
        let by_width = width_px as f64 / self.w;
        let by_height = height_px as f64 / self.h;
        match self.lock {
            SizeLock::Max => by_width.min(by_height),
            SizeLock::Width => by_width,
            SizeLock::Height => by_height,
        }
    }
}

/// 加工オプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    pub vectorize_if_flat: bool,
    pub min_stroke_pt: f64,
    pub underbase_choke_pt: f64,
    pub color_merge_delta_e: f64,
    pub max_colors_screen: usize,
    pub auto_remove_shadows: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            vectorize_if_flat: true,
            min_stroke_pt: 0.75,
            underbase_choke_pt: 0.75,
            color_merge_delta_e: 1.5,
            max_colors_screen: 6,
            auto_remove_shadows: true,
        }
    }
}

/// ジョブマニフェスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub job_id: String,
    pub method: PrintMethod,
    pub target_size_in: TargetSize,
    #[serde(default = "default_zone")]
    pub zone_id: String,
    #[serde(default = "default_garment")]
    pub garment_hex: String,
    #[serde(default = "default_dpi_min")]
    pub dpi_min: u32,
    #[serde(default = "default_icc")]
    pub icc_out: String,
    #[serde(default)]
    pub options: JobOptions,
}

fn default_zone() -> String {
    "front_chest".into()
}

fn default_garment() -> String {
    "#FFFFFF".into()
}

fn default_dpi_min() -> u32 {
    300
}

fn default_icc() -> String {
    "sRGB".into()
}

impl JobManifest {
    pub fn new(job_id: impl Into<String>, method: PrintMethod, target_size_in: TargetSize) -> Self {
        Self {
            job_id: job_id.into(),
            method,
            target_size_in,
            zone_id: default_zone(),
            garment_hex: default_garment(),
            dpi_min: default_dpi_min(),
            icc_out: default_icc(),
            options: JobOptions::default(),
        }
    }

    pub fn with_dpi_min(mut self, dpi_min: u32) -> Self {
        self.dpi_min = dpi_min;
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = zone_id.into();
        self
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// JSONから読み込み（省略されたオプションは既定値）
    pub fn from_json(json: &str) -> Result<Self> {
        let job: JobManifest = serde_json::from_str(json)?;
        job.validate()?;
        Ok(job)
    }

    /// 値の妥当性チェック
    pub fn validate(&self) -> Result<()> {
        if self.job_id.trim().is_empty() {
            return Err(Error::Invalid("job_id is empty".into()));
        }
        if !(self.target_size_in.w > 0.0 && self.target_size_in.h > 0.0) {
            return Err(Error::Invalid(format!(
                "target size must be positive: {}x{}",
                self.target_size_in.w, self.target_size_in.h
            )));
        }
        if self.dpi_min == 0 {
            return Err(Error::Invalid("dpi_min must be positive".into()));
        }
        Ok(())
    }
}
