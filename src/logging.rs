//! ログ初期化
//!
//! 出力は常に標準エラー。標準出力は機械可読な結果（子プロセスの結果行、
//! モックアップのマニフェスト）専用に空けておく。

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// tracing を初期化（RUST_LOG があれば優先）
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
