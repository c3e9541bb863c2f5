//! 商品テーブルからモックアップを作成してアップロード
//!
//! 標準出力にはマニフェスト JSON を1行だけ書く。それ以外はすべて標準エラー。

pub mod compositor;
pub mod storage;
pub mod table;

pub use storage::{BucketClient, ObjectStore};
pub use table::{mockup_config, MockupConfig, TableClient, TableRecord};

use crate::error::{MockupError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_TABLE_API: &str = "https://api.airtable.com/v0";

/// 実行環境（環境変数から1回だけ読む）
#[derive(Debug, Clone)]
pub struct MockupEnv {
    pub table_api_url: String,
    pub table_token: String,
    pub table_base_id: String,
    pub table_name: String,
    pub bucket_name: Option<String>,
    pub bucket_url: Option<String>,
    pub bucket_region: String,
    pub bucket_endpoint: Option<String>,
    pub upload_token: Option<String>,
    pub public_base_url: Option<String>,
}

impl MockupEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から読む（空文字は未設定扱い）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| MockupError::MissingEnv(key.to_string()));

        Ok(Self {
            table_token: require("AIRTABLE_PAT")?,
            table_base_id: require("AIRTABLE_BASE_ID")?,
            table_api_url: get("AIRTABLE_API_URL").unwrap_or_else(|| DEFAULT_TABLE_API.to_string()),
            table_name: get("AIRTABLE_TABLE_NAME").unwrap_or_else(|| "Products".to_string()),
            bucket_name: get("AWS_BUCKET_NAME"),
            bucket_url: get("AWS_BUCKET_URL"),
            bucket_region: get("AWS_REGION").unwrap_or_else(|| "us-east-2".to_string()),
            bucket_endpoint: get("AWS_BUCKET_ENDPOINT"),
            upload_token: get("AWS_UPLOAD_TOKEN"),
            public_base_url: get("PUBLIC_BASE_URL"),
        })
    }

    /// バケットが設定されていればクライアントを作る
    pub fn bucket_client(&self) -> Result<Option<BucketClient>> {
        let Some(bucket) = &self.bucket_name else {
            return Ok(None);
        };
        BucketClient::new(
            bucket,
            &self.bucket_region,
            self.bucket_endpoint.as_deref(),
            self.bucket_url.as_deref(),
            self.upload_token.as_deref(),
        )
        .map(Some)
    }
}

/// `mockups` サブコマンドの引数
#[derive(Debug, Clone)]
pub struct MockupRequest {
    pub email: String,
    pub logo_url: String,
    pub products_dir: PathBuf,
    pub product_id: Option<String>,
}

/// 画像ごとのアップロード URL
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductUrls {
    pub png_urls: Vec<String>,
    pub pdf_urls: Vec<String>,
    pub preview_urls: Vec<String>,
}

/// 標準出力に書くマニフェスト
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockupManifest {
    pub email: String,
    pub product_id: Option<String>,
    pub s3_prefix: String,
    pub product_map: BTreeMap<String, ProductUrls>,
}

/// メールアドレスをフォルダ名にする（"A.b@x.io" → "a_dot_b_at_x_dot_io"）
pub fn email_folder(email: &str) -> String {
    email.to_lowercase().replace('@', "_at_").replace('.', "_dot_")
}

/// ロゴ URL から保存ファイル名を決める
pub fn logo_file_name(logo_url: &str, content_type: Option<&str>) -> String {
    let from_path = url::Url::parse(logo_url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|mut s| s.next_back().map(String::from)))
        .filter(|name| !name.is_empty());

    match from_path {
        Some(name) if name.contains('.') => name,
        _ => {
            let ext = match content_type.map(|c| c.split(';').next().unwrap_or("").trim()) {
                Some("image/jpeg") => "jpg",
                Some("image/webp") => "webp",
                Some("image/svg+xml") => "svg",
                Some("image/gif") => "gif",
                _ => "png",
            };
            format!("logo.{}", ext)
        }
    }
}

async fn download(http: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response)
}

async fn download_logo(http: &reqwest::Client, logo_url: &str, dest_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;
    let response = download(http, logo_url).await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let path = dest_dir.join(logo_file_name(logo_url, content_type.as_deref()));
    std::fs::write(&path, response.bytes().await?)?;
    Ok(path)
}

/// 単一対象の商品画像がローカルになければ公開 URL から取得する
///
/// 取得できなければ元のフォルダを返す（合成時にスキップされる）。
async fn ensure_base_image_local(
    http: &reqwest::Client,
    image_file: &str,
    products_dir: &Path,
    public_base_url: Option<&str>,
    work_root: &Path,
) -> PathBuf {
    if products_dir.join(image_file).is_file() {
        return products_dir.to_path_buf();
    }
    let Some(base) = public_base_url else {
        return products_dir.to_path_buf();
    };

    let tmp_dir = work_root.join("products");
    let url = format!("{}/images/products/{}", base.trim_end_matches('/'), image_file);
    let fetched = async {
        std::fs::create_dir_all(&tmp_dir)?;
        let bytes = download(http, &url).await?.bytes().await?;
        std::fs::write(tmp_dir.join(image_file), bytes)?;
        Ok::<_, MockupError>(())
    }
    .await;

    match fetched {
        Ok(()) => tmp_dir,
        Err(e) => {
            warn!("商品画像を取得できません {}: {}", image_file, e);
            products_dir.to_path_buf()
        }
    }
}

/// モックアップを作成してアップロードし、マニフェストを返す
pub async fn build_mockups(env: &MockupEnv, request: &MockupRequest) -> Result<MockupManifest> {
    let table = TableClient::new(&env.table_api_url, &env.table_base_id, &env.table_name, &env.table_token)?;
    let records = table.fetch_records().await?;
    let config = mockup_config(&records, request.product_id.as_deref());
    if config.is_empty() {
        return Err(MockupError::NoMockupTargets(
            "ボックス付きの商品が選択条件に一致しません".into(),
        ));
    }
    info!("対象: {}件", config.len());

    let work = tempfile::Builder::new().prefix("mockups_").tempdir()?;
    let out_dir = work.path().join("out");
    let pdf_dir = work.path().join("pdf");
    let preview_dir = work.path().join("preview");
    for dir in [&out_dir, &pdf_dir, &preview_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;
    let logo_path = download_logo(&http, &request.logo_url, &work.path().join("logos")).await?;

    let mut products_dir = request.products_dir.clone();
    if config.len() == 1 {
        if let Some(image_file) = config.keys().next() {
            products_dir = ensure_base_image_local(
                &http,
                image_file,
                &request.products_dir,
                env.public_base_url.as_deref(),
                work.path(),
            )
            .await;
        }
    }

    let written = compositor::render_mockups(&logo_path, &products_dir, &config, &out_dir, &preview_dir)?;
    info!("合成完了: {}枚", written.len());

    let s3_prefix = format!("{}/mockups", email_folder(&request.email));
    let urls = match env.bucket_client()? {
        Some(store) => ProductUrls {
            png_urls: store.upload_folder(&out_dir, &s3_prefix).await?,
            pdf_urls: store.upload_folder(&pdf_dir, &s3_prefix).await?,
            preview_urls: store.upload_folder(&preview_dir, &s3_prefix).await?,
        },
        None => {
            warn!("AWS_BUCKET_NAME が未設定のためアップロードしません");
            ProductUrls::default()
        }
    };

    let product_map = config.keys().map(|k| (k.clone(), urls.clone())).collect();
    Ok(MockupManifest {
        email: request.email.clone(),
        product_id: request
            .product_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from),
        s3_prefix,
        product_map,
    })
}
