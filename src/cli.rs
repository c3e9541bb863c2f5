use clap::{Args, Parser, Subcommand};
use mockup_common::{JobManifest, PrintMethod, SizeLock, TargetSize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mockup")]
#[command(about = "ロゴ収集・加工とモックアップ作成のオペレータツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 商品画像にバウンディングボックスを付ける
    Label {
        /// 画像フォルダ（または画像1枚）
        #[arg(long, required = true)]
        images_root: PathBuf,

        /// ラベルファイル（デフォルト: 設定の logos_json）
        #[arg(long)]
        logos_json: Option<PathBuf>,

        /// セッション状態ファイル（デフォルト: 設定の state_json）
        #[arg(long)]
        state_json: Option<PathBuf>,

        /// 変更のたびに保存
        #[arg(long)]
        autosave: bool,

        /// 前回の位置とスキップから再開
        #[arg(long)]
        resume: bool,

        /// 未ラベル・未スキップの画像だけ表示
        #[arg(long)]
        unlabeled_only: bool,
    },

    /// サイトからロゴを取得（1サイトごとに子プロセスで隔離）
    Scrape {
        /// 対象 URL（スキーム省略時は https）
        #[arg(required = true)]
        urls: Vec<String>,

        /// 保存先（デフォルト: 設定の scrape_output_dir）
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// 1サイトあたりのタイムアウト秒
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// ロゴ画像を印刷用に加工
    Process {
        /// 入力画像
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        job: JobArgs,

        /// レポートを JSON で出力
        #[arg(long)]
        json: bool,
    },

    /// ロゴ取得から加工まで一括実行
    Run {
        /// 対象 URL
        #[arg(required = true)]
        url: String,

        #[command(flatten)]
        job: JobArgs,

        /// レポートを JSON で出力
        #[arg(long)]
        json: bool,
    },

    /// 子プロセス側の取得処理（内部用）
    #[command(hide = true)]
    FetchWorker {
        /// 保存先
        #[arg(long, default_value = "scraped_logos")]
        output_dir: PathBuf,

        /// 対象 URL
        url: String,
    },

    /// 商品テーブルからモックアップを作成してアップロード
    Mockups {
        /// 顧客メールアドレス（アップロード先フォルダ名に使用）
        #[arg(long, required = true)]
        email: String,

        /// ロゴ画像の URL
        #[arg(long, required = true)]
        logo_url: String,

        /// 商品画像フォルダ
        #[arg(long, required = true)]
        products_dir: PathBuf,

        /// この商品だけ作成
        #[arg(long)]
        product_id: Option<String>,
    },

    /// 商品画像をカタログの imageFile 名にリネーム
    Rename {
        /// imageFile: '...' を含む商品定義ファイル
        #[arg(long, required = true)]
        products_file: PathBuf,

        /// 商品画像フォルダ
        #[arg(long, required = true)]
        images_dir: PathBuf,

        /// ドライラン（リネームせずに計画だけ表示）
        #[arg(long)]
        dry_run: bool,
    },

    /// 設定を表示/初期化
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 既定値で上書き
        #[arg(long)]
        reset: bool,
    },
}

/// ジョブ指定（JSON ファイルまたは個別オプション）
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// ジョブマニフェスト JSON（指定時は他のジョブオプションより優先）
    #[arg(long)]
    pub job: Option<PathBuf>,

    /// ジョブID
    #[arg(long, default_value = "job")]
    pub job_id: String,

    /// 印刷方式 (dtf/dtg/screen-print/sublimation/uv/vinyl)
    #[arg(short, long, default_value = "dtf")]
    pub method: PrintMethod,

    /// 印刷幅（インチ）
    #[arg(long, default_value = "10")]
    pub width: f64,

    /// 印刷高さ（インチ）
    #[arg(long, default_value = "10")]
    pub height: f64,

    /// サイズ固定 (max/width/height)
    #[arg(long, default_value = "max")]
    pub lock: SizeLock,

    /// 最低解像度
    #[arg(long, default_value = "300")]
    pub dpi_min: u32,

    /// 配置ゾーン
    #[arg(long, default_value = "front_chest")]
    pub zone: String,
}

impl JobArgs {
    /// マニフェストを組み立てる
    pub fn to_manifest(&self) -> crate::error::Result<JobManifest> {
        if let Some(path) = &self.job {
            let content = std::fs::read_to_string(path)?;
            return Ok(JobManifest::from_json(&content)?);
        }
        let job = JobManifest::new(
            self.job_id.clone(),
            self.method,
            TargetSize { w: self.width, h: self.height, lock: self.lock },
        )
        .with_dpi_min(self.dpi_min)
        .with_zone(self.zone.clone());
        job.validate()?;
        Ok(job)
    }
}
