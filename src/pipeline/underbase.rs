//! DTF/DTG 用の白下地マスク

use super::{temp_output, PipelineStep, StepError};
use image::GrayImage;
use imageproc::morphology::{grayscale_erode, Mask};
use mockup_common::JobManifest;
use std::path::{Path, PathBuf};

/// 1pt あたりの収縮ピクセル数
const CHOKE_PX_PER_PT: f64 = 4.0;

/// 収縮量（ピクセル、最低1）
pub fn choke_px(choke_pt: f64) -> u8 {
    ((choke_pt * CHOKE_PX_PER_PT).floor() as i64).clamp(1, u8::MAX as i64) as u8
}

/// 下地マスクを作る: アルファがあれば max(輝度, アルファ)、なければ輝度
pub fn underbase_mask(img: &image::DynamicImage) -> GrayImage {
    let gray = img.to_luma8();
    if !img.color().has_alpha() {
        return gray;
    }
    let rgba = img.to_rgba8();
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        image::Luma([gray.get_pixel(x, y)[0].max(rgba.get_pixel(x, y)[3])])
    })
}

/// 下地を生成して作業ファイルに保存（対象外の方式は呼ばない）
pub fn generate_underbase(input: &Path, job: &JobManifest, temp_dir: &Path) -> Result<PathBuf, StepError> {
    let step = PipelineStep::Underbase;
    if !job.method.needs_underbase() {
        return Err(StepError::new(step, format!("{} does not use an underbase", job.method)));
    }

    let img = image::open(input).map_err(StepError::at(step))?;
    let mask = underbase_mask(&img);
    let choked = grayscale_erode(&mask, &Mask::square(choke_px(job.options.underbase_choke_pt)));

    let output = temp_output(temp_dir, "underbase", input);
    choked.save_with_format(&output, image::ImageFormat::Png).map_err(StepError::at(step))?;
    Ok(output)
}
