//! ロゴ取得の結合テスト
//!
//! 子プロセス隔離のタイムアウトと、ローカル HTTP サーバーを相手にした取得を検証

use mockup_kit::scraper::{run_isolated, Scraper, WorkerCommand, WorkerPhase};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// リクエストパスごとに固定の応答（ステータス・種別・本文）を返すサーバーを起動
fn serve(routes: Vec<(&'static str, &'static str, &'static str, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header == "\r\n" => break,
                    Ok(_) => {}
                }
            }

            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let response = routes.iter().find(|(p, _, _, _)| *p == path);
            let (status, content_type, body) = match response {
                Some((_, status, ct, body)) => (*status, *ct, body.clone()),
                None => ("404 Not Found", "text/plain", b"not found".to_vec()),
            };
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            stream.write_all(head.as_bytes()).ok();
            stream.write_all(&body).ok();
            stream.flush().ok();
        }
    });

    format!("http://{}", addr)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn worker_for(output_dir: &Path) -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_mockup"))
        .arg("fetch-worker")
        .arg("--output-dir")
        .arg(output_dir.as_os_str())
        .env("NO_PROXY", "*")
        .env("no_proxy", "*")
}

/// 応答しない子プロセスでも timeout + grace 程度で戻る
#[cfg(unix)]
#[tokio::test]
async fn test_hung_worker_is_bounded() {
    let command = WorkerCommand::new("sh").arg("-c").arg("sleep 30");
    let started = Instant::now();

    let run = run_isolated(&command, "slow.example", Duration::from_secs(1), Duration::from_secs(1)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(run.phases.contains(&WorkerPhase::TimedOut));
    assert_eq!(run.final_phase(), Some(WorkerPhase::Killed));
    assert!(run.outcome.error.unwrap().starts_with("Hard timeout after"));
    assert!(run.outcome.logo_path.is_none());
}

/// ロゴを見つけて保存する
#[tokio::test]
async fn test_fetch_logo_from_local_site() {
    let html = r#"<html><head><title>Acme</title></head>
        <body><header><img class="site-logo" src="/static/brand.png" alt="Acme"></header></body></html>"#;
    let base = serve(vec![
        ("/", "200 OK", "text/html", html.as_bytes().to_vec()),
        ("/static/brand.png", "200 OK", "image/png", png_bytes(1200, 300)),
    ]);
    let dir = tempdir().expect("Failed to create temp dir");

    let scraper = Scraper::with_command(worker_for(dir.path()), dir.path(), Duration::from_secs(15), Duration::from_secs(2));
    let outcome = scraper.scrape_website(&format!("{}/", base)).await;

    assert!(outcome.error.is_none(), "error: {:?}", outcome.error);
    let logo = outcome.logo_path.expect("ロゴが保存されていません");
    assert!(logo.ends_with("_logo.png"));

    // 長辺は 800 px に縮小される
    let (w, h) = image::image_dimensions(&logo).unwrap();
    assert_eq!((w, h), (800, 200));
}

/// ロゴがないページはエラーなしの「なし」
#[tokio::test]
async fn test_page_without_logo() {
    let html = "<html><body><p>nothing here</p></body></html>";
    let base = serve(vec![("/", "200 OK", "text/html", html.as_bytes().to_vec())]);
    let dir = tempdir().expect("Failed to create temp dir");

    let scraper = Scraper::with_command(worker_for(dir.path()), dir.path(), Duration::from_secs(15), Duration::from_secs(2));
    let outcome = scraper.scrape_website(&format!("{}/", base)).await;

    assert!(outcome.logo_path.is_none());
    assert!(outcome.error.is_none());
}

/// サーバーエラーの本文は解析せずエラーとして返す
#[tokio::test]
async fn test_server_error_is_reported() {
    let html = r#"<html><body><img id="logo" src="/logo.png"></body></html>"#;
    let base = serve(vec![
        ("/", "500 Internal Server Error", "text/html", html.as_bytes().to_vec()),
        ("/logo.png", "200 OK", "image/png", png_bytes(64, 64)),
    ]);
    let dir = tempdir().expect("Failed to create temp dir");

    let scraper = Scraper::with_command(worker_for(dir.path()), dir.path(), Duration::from_secs(15), Duration::from_secs(2));
    let outcome = scraper.scrape_website(&format!("{}/", base)).await;

    assert!(outcome.logo_path.is_none());
    let error = outcome.error.expect("エラーが記録されていません");
    assert!(error.contains("500"), "error: {}", error);
    let saved = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with("_logo.png"))
        .count();
    assert_eq!(saved, 0);
}

/// 1件の失敗が他のサイトに影響しない
#[tokio::test]
async fn test_scrape_multiple_keeps_order() {
    let html = r#"<html><body><img id="logo" src="logo.png"></body></html>"#;
    let base = serve(vec![
        ("/", "200 OK", "text/html", html.as_bytes().to_vec()),
        ("/logo.png", "200 OK", "image/png", png_bytes(64, 64)),
    ]);
    let dir = tempdir().expect("Failed to create temp dir");

    let scraper = Scraper::with_command(worker_for(dir.path()), dir.path(), Duration::from_secs(15), Duration::from_secs(2));
    let urls = vec![
        "nonexistent-domain-for-testing.invalid".to_string(),
        format!("{}/", base),
    ];
    let results = scraper.scrape_multiple(&urls).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].error.as_deref().unwrap_or("").starts_with("DNS resolution failed"));
    assert!(results[1].has_logo());
}
