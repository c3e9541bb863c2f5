use anyhow::{bail, Context};
use clap::Parser;
use mockup_kit::cli::{Cli, Commands};
use mockup_kit::config::Config;
use mockup_kit::pipeline::{self, LogoPipeline, ProcessReport};
use mockup_kit::scraper::{self as fetcher, Scraper};
use mockup_kit::{labeler, logging, mockup, rename};
use std::process::ExitCode;
use std::time::Duration;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load().context("設定の読み込みに失敗しました")?;

    match cli.command {
        Commands::Label { images_root, logos_json, state_json, autosave, resume, unlabeled_only } => {
            println!("🏷  mockup - ラベリング\n");
            let options = labeler::LabelerOptions {
                images_root,
                logos_json: logos_json.unwrap_or_else(|| config.logos_json.clone()),
                state_json: state_json.unwrap_or_else(|| config.state_json.clone()),
                autosave,
                resume,
                unlabeled_only,
                default_box_name: config.default_box_name.clone(),
            };
            labeler::run_labeler(&options)?;
        }

        Commands::Scrape { urls, output_dir, timeout } => {
            println!("🌐 mockup - ロゴ取得\n");
            let output_dir = output_dir.unwrap_or_else(|| config.scrape_output_dir.clone());
            let timeout = timeout.map(Duration::from_secs).unwrap_or_else(|| config.per_site_timeout());
            let scraper = Scraper::new(&output_dir, timeout, config.grace_period())?;

            let results = scraper.scrape_multiple(&urls).await;
            println!();
            fetcher::print_results(&results);
        }

        Commands::Process { input, job, json } => {
            println!("🎨 mockup - ロゴ加工\n");
            if !input.exists() {
                bail!("ファイルが見つかりません: {}", input.display());
            }
            let job = job.to_manifest()?;
            let processor = LogoPipeline::from_config(&config)?;

            let report = processor.process(&input, &job);
            finish_report(&report, json)?;
        }

        Commands::Run { url, job, json } => {
            println!("🚀 mockup - 取得から加工まで\n");
            let job = job.to_manifest()?;
            let scraper = Scraper::from_config(&config)?;
            let processor = LogoPipeline::from_config(&config)?;

            let report = pipeline::scrape_and_process_logo(&url, &job, &scraper, &processor).await;
            finish_report(&report, json)?;
        }

        // 子プロセス側。標準出力には結果行だけを書く
        Commands::FetchWorker { url, output_dir } => {
            fetcher::worker::run_worker(&url, &output_dir).await?;
        }

        Commands::Mockups { email, logo_url, products_dir, product_id } => {
            eprintln!("🖼  mockup - モックアップ作成\n");
            let env = mockup::MockupEnv::from_env()?;
            let request = mockup::MockupRequest { email, logo_url, products_dir, product_id };

            let manifest = mockup::build_mockups(&env, &request).await?;
            let count: usize = manifest.product_map.values().map(|u| u.png_urls.len()).sum();
            eprintln!("✔ {}件をアップロード: {}", count, manifest.s3_prefix);

            // 標準出力にはマニフェストだけを書く
            println!("{}", serde_json::to_string(&manifest)?);
        }

        Commands::Rename { products_file, images_dir, dry_run } => {
            println!("📝 mockup - 画像リネーム{}\n", if dry_run { " (ドライラン)" } else { "" });
            let report = rename::rename_to_catalog(&products_file, &images_dir, dry_run)?;
            report.print();
            if !report.errors.is_empty() {
                bail!("{}件のリネームに失敗しました", report.errors.len());
            }
        }

        Commands::Config { show, reset } => {
            if reset {
                Config::default().save()?;
                println!("✔ 設定を初期化しました: {}", Config::config_path()?.display());
            }
            if show || !reset {
                let current = if reset { Config::default() } else { config };
                println!("設定ファイル: {}", Config::config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&current)?);
            }
        }
    }

    Ok(())
}

/// 加工結果を表示（失敗時はエラーで終了）
fn finish_report(report: &ProcessReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(report);
    }

    if !report.success {
        bail!(
            "ジョブ {} は完了しませんでした: {}",
            report.job_id,
            report.error.as_deref().unwrap_or("検証に失敗")
        );
    }
    Ok(())
}

fn print_report(report: &ProcessReport) {
    if let Some(analysis) = &report.analysis {
        println!(
            "解析: {:?}, {:.0} ppi, 色数 {}, 推奨 {:?}",
            analysis.logo_type, analysis.effective_ppi, analysis.unique_colors, analysis.recommended_path
        );
    }
    for failure in &report.step_failures {
        println!("✗ {}: {}", failure.step, failure.reason);
    }
    if report.underbase_generated {
        println!("✔ 下地を生成");
    }
    if let Some(validation) = &report.validation {
        println!("品質スコア: {}/100", validation.quality_score);
        for issue in &validation.issues {
            println!("  ✗ {}", issue);
        }
        for warning in &validation.warnings {
            println!("  ! {}", warning);
        }
    }
    match &report.final_path {
        Some(path) => println!("\n✔ 出力: {} ({:.1}s)", path.display(), report.processing_time_secs),
        None => println!("\n✗ 出力なし ({:.1}s)", report.processing_time_secs),
    }
}
