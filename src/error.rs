use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockupError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("環境変数が設定されていません: {0}")]
    MissingEnv(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("未ラベルの画像がありません: {0}")]
    NothingToLabel(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("画像処理エラー: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ジョブ定義が不正: {0}")]
    InvalidJob(#[from] mockup_common::Error),

    #[error("子プロセス実行エラー: {0}")]
    Worker(String),

    #[error("テーブルAPIエラー: {0}")]
    TableApi(String),

    #[error("アップロードエラー: {0}")]
    Upload(String),

    #[error("対象の商品がありません: {0}")]
    NoMockupTargets(String),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),
}

pub type Result<T> = std::result::Result<T, MockupError>;
