//! HTML からロゴ画像 URL を探す
//!
//! 上から順にヒューリスティックを試し、最初に見つかった候補を採用する。

use scraper::{ElementRef, Html, Selector};
use url::Url;

const LOGO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "svg", "webp"];

/// 探索ルール
#[derive(Debug, Clone, Copy)]
enum LogoHeuristic {
    /// CSS セレクタに一致する img
    Css(&'static str),
    /// img の属性値に文字列を含む（大文字小文字を区別しない）
    AttrContains { attr: &'static str, needle: &'static str },
}

const HEURISTICS: &[LogoHeuristic] = &[
    LogoHeuristic::AttrContains { attr: "alt", needle: "logo" },
    LogoHeuristic::Css(".logo img"),
    LogoHeuristic::Css("#logo img"),
    LogoHeuristic::AttrContains { attr: "class", needle: "logo" },
    LogoHeuristic::AttrContains { attr: "src", needle: "logo" },
    LogoHeuristic::Css("header img:first-child"),
    LogoHeuristic::Css("nav img:first-child"),
    LogoHeuristic::Css(".navbar-brand img"),
    LogoHeuristic::Css(".site-logo img"),
];

impl LogoHeuristic {
    fn candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match *self {
            LogoHeuristic::Css(css) => match Selector::parse(css) {
                Ok(selector) => document.select(&selector).collect(),
                Err(_) => Vec::new(),
            },
            LogoHeuristic::AttrContains { attr, needle } => match Selector::parse("img") {
                Ok(selector) => document
                    .select(&selector)
                    .filter(|img| {
                        img.value()
                            .attr(attr)
                            .map(|v| v.to_lowercase().contains(needle))
                            .unwrap_or(false)
                    })
                    .collect(),
                Err(_) => Vec::new(),
            },
        }
    }
}

/// ページ中のロゴ画像 URL（絶対 URL）を返す
pub fn find_logo_url(html: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let document = Html::parse_document(html);

    HEURISTICS.iter().find_map(|heuristic| {
        heuristic.candidates(&document).into_iter().find_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() {
                return None;
            }
            resolve_image_url(&base, src)
        })
    })
}

/// 相対 URL を解決し、画像拡張子で終わるものだけ返す
fn resolve_image_url(base: &Url, src: &str) -> Option<String> {
    let resolved = base.join(src).ok()?;
    let path = resolved.path().to_lowercase();
    let has_image_ext = path
        .rsplit_once('.')
        .map(|(_, ext)| LOGO_EXTENSIONS.contains(&ext))
        .unwrap_or(false);
    has_image_ext.then(|| resolved.to_string())
}
