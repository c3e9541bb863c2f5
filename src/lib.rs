//! Mockup Kit
//!
//! 商品画像のラベリング、サイトからのロゴ取得、印刷用のロゴ加工、
//! モックアップ作成とアップロードをまとめたオペレータツール群

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod labeler;
pub mod logging;
pub mod mockup;
pub mod pipeline;
pub mod rename;
pub mod scraper;
