//! スクレイピング結果の型と URL ヘルパー

use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// 1サイト分の取得結果
///
/// 子プロセスから親へ JSON 1行で渡される。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub company_name: String,
    pub url: String,
    pub logo_path: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub duration: f64,
}

impl ScrapeOutcome {
    /// エラー結果を作る
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            company_name: company_name_from_url(url),
            url: url.to_string(),
            logo_path: None,
            error: Some(error.into()),
            duration: 0.0,
        }
    }

    pub fn has_logo(&self) -> bool {
        self.logo_path.is_some()
    }
}

/// スキームがなければ https:// を補う
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// URL のホスト部分（ポートと IPv6 の角括弧を除く）
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(&normalize_url(url)).ok()?;
    match parsed.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

/// 明示されたポート、なければスキームの既定ポート
pub fn port_of(url: &str) -> Option<u16> {
    Url::parse(&normalize_url(url)).ok()?.port_or_known_default()
}

/// ドメインから会社名を推定（"www.acme-tools.com" → "Acme-Tools"）
pub fn company_name_from_url(url: &str) -> String {
    let host = host_of(url).unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let label = host.split('.').next().unwrap_or("");
    title_case(label)
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
