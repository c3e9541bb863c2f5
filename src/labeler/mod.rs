//! バウンディングボックスのラベリング
//!
//! - `store`: ラベルファイル（バックアップ付き保存）
//! - `state`: 再開用のセッション状態
//! - `controller`: 描画に依存しない状態遷移
//! - `terminal`: dialoguer による対話ループ

pub mod controller;
pub mod state;
pub mod store;
pub mod terminal;

pub use controller::{Command, Glyph, Progress, Session, SessionOptions, SessionSink, Status, Tone, Transition};
pub use state::SessionStore;
pub use store::LabelStore;

use crate::catalog::scan_images;
use crate::error::{MockupError, Result};
use mockup_common::{LabelMap, SessionState};
use std::path::PathBuf;
use tracing::info;

/// ファイルに保存する `SessionSink`
pub struct FileSink {
    labels: LabelStore,
    state: SessionStore,
}

impl FileSink {
    pub fn new(labels: LabelStore, state: SessionStore) -> Self {
        Self { labels, state }
    }
}

impl SessionSink for FileSink {
    fn save_labels(&mut self, labels: &LabelMap) -> Result<()> {
        if let Some(backup) = self.labels.save(labels)? {
            info!("バックアップ: {}", backup.display());
        }
        Ok(())
    }

    fn save_state(&mut self, state: &SessionState) -> Result<SessionState> {
        self.state.save_merged(state)
    }
}

/// `label` サブコマンドの設定
#[derive(Debug, Clone)]
pub struct LabelerOptions {
    pub images_root: PathBuf,
    pub logos_json: PathBuf,
    pub state_json: PathBuf,
    pub autosave: bool,
    pub resume: bool,
    pub unlabeled_only: bool,
    pub default_box_name: String,
}

/// カタログ・ラベル・状態を読み込んでセッションを作る
pub fn open_session(options: &LabelerOptions) -> Result<Session> {
    let images = scan_images(&options.images_root)?;
    if images.is_empty() {
        return Err(MockupError::NoImagesFound(options.images_root.display().to_string()));
    }

    let labels = LabelStore::new(&options.logos_json).load();
    let resume = options
        .resume
        .then(|| SessionStore::new(&options.state_json).load());

    Session::open(
        images,
        labels,
        resume,
        SessionOptions {
            autosave: options.autosave,
            unlabeled_only: options.unlabeled_only,
            default_box_name: options.default_box_name.clone(),
        },
    )
}

/// ラベリングを実行
pub fn run_labeler(options: &LabelerOptions) -> Result<()> {
    let session = open_session(options)?;
    info!(
        "ラベリング開始: {}枚 (ラベル: {}, 状態: {})",
        session.len(),
        options.logos_json.display(),
        options.state_json.display()
    );

    let mut sink = FileSink::new(
        LabelStore::new(&options.logos_json),
        SessionStore::new(&options.state_json),
    );
    let session = terminal::run_terminal(session, &mut sink)?;

    sink.save_state(&session.session_state())?;
    let p = session.progress();
    println!(
        "\n✓ 終了: {}/{} 完了 (ラベル済み {}, スキップ {})",
        p.done(),
        p.total,
        p.labeled,
        p.skipped
    );
    Ok(())
}
