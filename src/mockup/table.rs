//! 商品テーブル API クライアント
//!
//! `GET {api}/{base}/{table}?pageSize=100&offset=...` を offset がなくなるまで繰り返す。

use crate::error::{MockupError, Result};
use mockup_common::ImageLabels;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

const PAGE_SIZE: u32 = 100;

/// 画像ファイル名 → ボックス
pub type MockupConfig = BTreeMap<String, ImageLabels>;

/// テーブルの1行
#[derive(Debug, Clone, Deserialize)]
pub struct TableRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    records: Vec<TableRecord>,
    offset: Option<String>,
}

impl TableRecord {
    fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `product_id`、なければ `id` フィールド
    pub fn product_id(&self) -> Option<String> {
        self.text("product_id").or_else(|| self.text("id"))
    }

    pub fn image_file(&self) -> Option<String> {
        self.text("image_file")
    }

    /// `boxes` フィールド（`{"boxes": [...]}` の JSON 文字列）。読めなければ空
    pub fn labels(&self) -> ImageLabels {
        match self.fields.get("boxes") {
            Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_default(),
            Some(obj @ Value::Object(_)) => serde_json::from_value(obj.clone()).unwrap_or_default(),
            _ => ImageLabels::default(),
        }
    }
}

/// 行からモックアップ設定を作る（ボックスのない行は除外）
pub fn mockup_config(records: &[TableRecord], product_id: Option<&str>) -> MockupConfig {
    let target = product_id.map(str::trim).filter(|p| !p.is_empty());

    records
        .iter()
        .filter(|r| match target {
            Some(t) => r.product_id().as_deref() == Some(t),
            None => true,
        })
        .filter_map(|r| {
            let image_file = r.image_file()?;
            let labels = r.labels();
            (!labels.boxes.is_empty()).then_some((image_file, labels))
        })
        .collect()
}

/// テーブル API クライアント
pub struct TableClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl TableClient {
    pub fn new(api_url: &str, base_id: &str, table: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/{}/{}", api_url.trim_end_matches('/'), base_id, table),
            token: token.to_string(),
        })
    }

    /// 全ページを取得
    pub async fn fetch_records(&self) -> Result<Vec<TableRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query = vec![("pageSize".to_string(), PAGE_SIZE.to_string())];
            if let Some(o) = &offset {
                query.push(("offset".to_string(), o.clone()));
            }

            let response = self
                .http
                .get(&self.endpoint)
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(MockupError::TableApi(format!("HTTP {}: {}", status, body)));
            }

            let page: Page = response.json().await?;
            debug!("テーブル取得: {}件 (offset: {:?})", page.records.len(), page.offset);
            records.extend(page.records);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }
        Ok(records)
    }
}
