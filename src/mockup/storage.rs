//! オブジェクトストレージへのアップロード
//!
//! リクエスト署名は扱わない。バケットのエンドポイントに HTTP PUT し、
//! 必要ならアップロード用トークンを Bearer で付ける。

use crate::error::{MockupError, Result};
use std::path::Path;
use tracing::info;

/// アップロード先
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// 1ファイルを `key` に置き、公開 URL を返す
    async fn put_file(&self, local: &Path, key: &str) -> Result<String>;

    /// フォルダ直下のファイルを `prefix/<name>` に置く（フォルダがなければ空）
    async fn upload_folder(&self, dir: &Path, prefix: &str) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        if !dir.is_dir() {
            return Ok(urls);
        }

        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let key = format!("{}/{}", prefix.trim_end_matches('/'), name);
            urls.push(self.put_file(&file, &key).await?);
        }
        Ok(urls)
    }
}

/// 拡張子から Content-Type を決める
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// HTTP PUT で書き込むバケットクライアント
pub struct BucketClient {
    http: reqwest::Client,
    bucket: String,
    endpoint: String,
    public_base_url: Option<String>,
    token: Option<String>,
}

impl BucketClient {
    /// `endpoint` 省略時は `https://<bucket>.s3.<region>.amazonaws.com`
    pub fn new(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        public_base_url: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self> {
        let endpoint = endpoint
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}.s3.{}.amazonaws.com", bucket, region));
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            bucket: bucket.to_string(),
            endpoint,
            public_base_url: public_base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            token: token.map(String::from),
        })
    }

    /// 公開 URL（ベース URL がなければ `s3://bucket/key`）
    pub fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => format!("s3://{}/{}", self.bucket, key),
        }
    }
}

impl ObjectStore for BucketClient {
    async fn put_file(&self, local: &Path, key: &str) -> Result<String> {
        let body = std::fs::read(local)?;
        let mut request = self
            .http
            .put(format!("{}/{}", self.endpoint, key))
            .header(reqwest::header::CONTENT_TYPE, content_type_for(local))
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MockupError::Upload(format!("{} -> HTTP {}", key, response.status())));
        }
        info!("アップロード: {}", key);
        Ok(self.public_url(key))
    }
}
