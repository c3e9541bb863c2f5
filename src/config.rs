use crate::error::{MockupError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 永続設定（~/.config/mockup-kit/config.json）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logos_json: PathBuf,
    pub state_json: PathBuf,
    pub default_box_name: String,
    pub scrape_output_dir: PathBuf,
    pub per_site_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub pipeline_output_dir: PathBuf,
    pub pipeline_temp_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logos_json: PathBuf::from("output/logos.json"),
            state_json: PathBuf::from("output/labeler_state.json"),
            default_box_name: mockup_common::DEFAULT_BOX_NAME.into(),
            scrape_output_dir: PathBuf::from("scraped_logos"),
            per_site_timeout_secs: 15,
            grace_period_secs: 2,
            pipeline_output_dir: PathBuf::from("enhanced_output"),
            pipeline_temp_dir: PathBuf::from("temp_processing"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MockupError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("mockup-kit").join("config.json"))
    }

    pub fn per_site_timeout(&self) -> Duration {
        Duration::from_secs(self.per_site_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}
