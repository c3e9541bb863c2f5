//! ロゴ収集
//!
//! - `isolation`: 子プロセス隔離とタイムアウト
//! - `worker`: 子プロセス側の取得処理
//! - `locator`: HTML からのロゴ探索

pub mod isolation;
pub mod locator;
pub mod worker;

pub use isolation::{run_isolated, IsolatedRun, WorkerCommand, WorkerPhase};

use crate::config::Config;
use crate::error::{MockupError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mockup_common::ScrapeOutcome;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// サイトごとに子プロセスを使う取得器
#[derive(Debug, Clone)]
pub struct Scraper {
    command: WorkerCommand,
    output_dir: PathBuf,
    per_site_timeout: Duration,
    grace_period: Duration,
}

impl Scraper {
    /// 自分自身の `fetch-worker` を子プロセスとして使う
    pub fn new(output_dir: &Path, per_site_timeout: Duration, grace_period: Duration) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let command = WorkerCommand::fetch_worker(output_dir)
            .map_err(|e| MockupError::Worker(format!("実行ファイルの場所が取得できません: {}", e)))?;
        Ok(Self::with_command(command, output_dir, per_site_timeout, grace_period))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.scrape_output_dir, config.per_site_timeout(), config.grace_period())
    }

    /// 任意の子プロセスコマンドで作る
    pub fn with_command(
        command: WorkerCommand,
        output_dir: &Path,
        per_site_timeout: Duration,
        grace_period: Duration,
    ) -> Self {
        Self {
            command,
            output_dir: output_dir.to_path_buf(),
            per_site_timeout,
            grace_period,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 1サイトを取得（失敗は結果の error に入る）
    pub async fn scrape_website(&self, url: &str) -> ScrapeOutcome {
        info!("取得開始 {} (タイムアウト {}s)", url, self.per_site_timeout.as_secs());
        let run = run_isolated(&self.command, url, self.per_site_timeout, self.grace_period).await;
        let outcome = run.outcome;

        match &outcome.logo_path {
            Some(path) => info!("ロゴ取得 {:.1}s: {}", outcome.duration, path),
            None => warn!(
                "ロゴなし {:.1}s: {}",
                outcome.duration,
                outcome.error.as_deref().unwrap_or("Unknown error")
            ),
        }
        outcome
    }

    /// 複数サイトを順番に取得（10件ごとに集計をログ出力）
    pub async fn scrape_multiple(&self, urls: &[String]) -> Vec<ScrapeOutcome> {
        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut results = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            pb.set_message(url.clone());
            results.push(self.scrape_website(url).await);
            pb.inc(1);

            let done = i + 1;
            if done % 10 == 0 {
                let summary = ScrapeSummary::of(&results);
                info!(
                    "進捗: {}/{} ({:.1}%) - ロゴ {}件 - 平均 {:.1}s/サイト",
                    done,
                    urls.len(),
                    100.0 * done as f64 / urls.len() as f64,
                    summary.found,
                    summary.average_secs
                );
            }
        }
        pb.finish_and_clear();
        results
    }
}

/// 取得結果の集計
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrapeSummary {
    pub total: usize,
    pub found: usize,
    pub average_secs: f64,
}

impl ScrapeSummary {
    pub fn of(results: &[ScrapeOutcome]) -> Self {
        let total = results.len();
        let found = results.iter().filter(|r| r.has_logo()).count();
        let average_secs = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.duration).sum::<f64>() / total as f64
        };
        Self { total, found, average_secs }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.found as f64 / self.total as f64
        }
    }
}

/// 結果一覧を表示
pub fn print_results(results: &[ScrapeOutcome]) {
    for r in results {
        let status = if r.has_logo() { "✔ 成功" } else { "✗ 失敗" };
        let detail = match (&r.logo_path, &r.error) {
            (Some(path), _) => path.clone(),
            (None, Some(err)) => err.clone(),
            (None, None) => "ロゴが見つかりません".to_string(),
        };
        println!("{} - {} ({:.1}s): {}", status, r.url, r.duration, detail);
    }

    let summary = ScrapeSummary::of(results);
    println!(
        "\n成功率: {}/{} ({:.1}%)",
        summary.found,
        summary.total,
        summary.success_rate()
    );
}
