//! 子プロセス側の取得処理（`mockup fetch-worker`）
//!
//! 1サイトだけ取得して結果を標準出力に JSON 1行で書く。
//! 標準入力が閉じられたら即終了する（親からの終了要求）。

use super::locator::find_logo_url;
use crate::error::Result;
use image::imageops::FilterType;
use lazy_static::lazy_static;
use mockup_common::{company_name_from_url, normalize_url, ScrapeOutcome};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, USER_AGENT};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use url::{Host, Url};

const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const DNS_TIMEOUT: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const LOGO_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LOGO_SIDE: u32 = 800;

/// 終了要求を受けたときの終了コード
pub const TERMINATED_EXIT_CODE: i32 = 143;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").unwrap();
}

/// 会社名をファイル名に使える形にする（"Acme Tools-Inc" → "Acme_Tools_Inc"）
pub fn safe_file_stem(company_name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(company_name, "");
    SEPARATORS.replace_all(&cleaned, "_").to_string()
}

/// 標準入力の EOF を監視し、閉じられたらプロセスを終了する
pub fn exit_on_stdin_close() {
    std::thread::spawn(|| {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => std::process::exit(TERMINATED_EXIT_CODE),
                Ok(_) => {}
            }
        }
    });
}

/// fetch-worker のエントリポイント（結果を書いたらプロセスを終了する）
pub async fn run_worker(url: &str, output_dir: &Path) -> Result<()> {
    exit_on_stdin_close();

    let outcome = fetch_logo(url, output_dir).await;
    let line = serde_json::to_string(&outcome)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    // タイムアウトした名前解決のスレッドを待たずに終了
    std::process::exit(0)
}

/// 1サイトからロゴを取得する（ネットワークエラーは結果の error に入る）
pub async fn fetch_logo(url: &str, output_dir: &Path) -> ScrapeOutcome {
    let started = Instant::now();
    let url = normalize_url(url);
    let company_name = company_name_from_url(&url);

    let mut outcome = ScrapeOutcome {
        company_name: company_name.clone(),
        url: url.clone(),
        ..Default::default()
    };

    match fetch_inner(&url, &company_name, output_dir).await {
        Ok(path) => outcome.logo_path = path.map(|p| p.to_string_lossy().to_string()),
        Err(e) => outcome.error = Some(e),
    }

    outcome.duration = started.elapsed().as_secs_f64();
    outcome
}

async fn fetch_inner(url: &str, company_name: &str, output_dir: &Path) -> std::result::Result<Option<PathBuf>, String> {
    resolve_host(url).await?;

    let client = build_client().map_err(|e| e.to_string())?;
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(describe_request_error)?;
    let page_url = response.url().to_string();
    let body = response.text().await.map_err(describe_request_error)?;

    let Some(logo_url) = find_logo_url(&body, &page_url) else {
        debug!("ロゴが見つかりません: {}", url);
        return Ok(None);
    };

    match download_logo(&client, &logo_url, company_name, output_dir).await {
        Ok(path) => Ok(Some(path)),
        Err(e) => {
            debug!("ロゴのダウンロードに失敗 {}: {}", logo_url, e);
            Ok(None)
        }
    }
}

/// DNS 解決を短いタイムアウトで先に試す（IP アドレス直指定は解決不要）
async fn resolve_host(url: &str) -> std::result::Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;
    let port = parsed.port_or_known_default().unwrap_or(443);
    let host = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => return Ok(()),
        None => return Err("Invalid URL: missing host".into()),
    };

    let result = match tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((host.as_str(), port))).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(format!("DNS resolution failed: {}", e)),
        Err(_) => Err("DNS resolution failed: timed out".into()),
    };
    result
}

fn build_client() -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(true)
        .build()
}

fn describe_request_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".into()
    } else if e.is_connect() {
        "Connection error".into()
    } else {
        e.to_string()
    }
}

/// ロゴを取得して `<会社名>_logo.png` に保存
///
/// 画像として読めれば RGBA 化・縮小して PNG、読めなければ受信したバイト列をそのまま書く。
async fn download_logo(
    client: &reqwest::Client,
    logo_url: &str,
    company_name: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}_logo.png", safe_file_stem(company_name)));

    let bytes = client
        .get(logo_url)
        .timeout(LOGO_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    match image::load_from_memory(&bytes) {
        Ok(img) => {
            let mut rgba = image::DynamicImage::ImageRgba8(img.to_rgba8());
            if rgba.width() > MAX_LOGO_SIDE || rgba.height() > MAX_LOGO_SIDE {
                rgba = rgba.resize(MAX_LOGO_SIDE, MAX_LOGO_SIDE, FilterType::Lanczos3);
            }
            rgba.save_with_format(&path, image::ImageFormat::Png)?;
        }
        Err(e) => {
            debug!("画像としてデコードできないため生データを保存: {}", e);
            std::fs::write(&path, &bytes)?;
        }
    }

    Ok(path)
}
