//! ラベリングセッションの状態遷移
//!
//! 描画面を持たない純粋な状態値。コマンドを受けるたびに新しいセッション値と
//! ステータス表示を返すので、各遷移を単体テストできる。永続化は `SessionSink` 経由。

use crate::catalog::file_name_of;
use crate::error::{MockupError, Result};
use mockup_common::labels::{boxes_for, clear_boxes, pop_box, push_box};
use mockup_common::{BoundingBox, LabelMap, SessionState, DEFAULT_BOX_NAME};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 矩形選択の最小幅・高さ（ピクセル）
const MIN_SPAN_PX: i64 = 2;

/// ラベルとセッション状態の保存先
pub trait SessionSink {
    fn save_labels(&mut self, labels: &LabelMap) -> Result<()>;
    /// 保存後の（既存ファイルと合成した）状態を返す
    fn save_state(&mut self, state: &SessionState) -> Result<SessionState>;
}

/// ユーザー操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 矩形を選択（保留中の矩形を置き換える）
    SelectRegion { from: (i64, i64), to: (i64, i64) },
    /// 保留中の矩形を名前付きで追加
    AddBox { name: String },
    Undo,
    Clear,
    Next,
    Previous,
    NextUnlabeled,
    Skip,
    Save,
    ToggleAutosave,
    ToggleHelp,
}

/// 表示色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Bad,
}

/// 画像ごとの状態記号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Skipped,
    Unsaved,
    Labeled,
    Unlabeled,
}

impl Glyph {
    pub fn symbol(&self) -> &'static str {
        match self {
            Glyph::Skipped => "–",
            Glyph::Unsaved => "•",
            Glyph::Labeled => "✓",
            Glyph::Unlabeled => "○",
        }
    }
}

/// カタログ全体の進捗
///
/// 各画像はスキップ > ラベル済み > 未ラベルの順で1回だけ数える。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub labeled: usize,
    pub skipped: usize,
}

impl Progress {
    pub fn done(&self) -> usize {
        self.labeled + self.skipped
    }

    pub fn unlabeled(&self) -> usize {
        self.total - self.done()
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.done() as f64 / self.total as f64
        }
    }
}

/// 遷移後に表示するステータス
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub title: String,
    pub progress: String,
    pub message: Option<String>,
    pub tone: Tone,
}

impl Status {
    /// 進捗行（メッセージがあれば先頭に付ける）
    pub fn status_line(&self) -> String {
        match &self.message {
            Some(msg) => format!("{}    |    {}", msg, self.progress),
            None => self.progress.clone(),
        }
    }
}

/// 遷移結果
#[derive(Debug)]
pub struct Transition {
    pub session: Session,
    pub status: Status,
}

/// セッション起動オプション
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub autosave: bool,
    pub unlabeled_only: bool,
    pub default_box_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            autosave: false,
            unlabeled_only: false,
            default_box_name: DEFAULT_BOX_NAME.to_string(),
        }
    }
}

/// ラベリングセッション
#[derive(Debug, Clone)]
pub struct Session {
    catalog: Vec<String>,
    images: Vec<PathBuf>,
    index: usize,
    pending: Option<BoundingBox>,
    dirty: bool,
    autosave: bool,
    unlabeled_only: bool,
    show_help: bool,
    default_box_name: String,
    labels: LabelMap,
    skipped: BTreeSet<String>,
}

impl Session {
    /// カタログとラベルからセッションを開始
    ///
    /// `resume` があれば位置とスキップ集合を復元する。
    pub fn open(
        images: Vec<PathBuf>,
        labels: LabelMap,
        resume: Option<SessionState>,
        options: SessionOptions,
    ) -> Result<Self> {
        if images.is_empty() {
            return Err(MockupError::NoImagesFound("カタログが空です".into()));
        }

        let catalog: Vec<String> = images.iter().map(|p| file_name_of(p)).collect();
        let (skipped, index) = match resume {
            Some(state) => (state.skipped, state.current_index),
            None => (BTreeSet::new(), 0),
        };

        let working: Vec<PathBuf> = if options.unlabeled_only {
            images
                .into_iter()
                .filter(|p| {
                    let name = file_name_of(p);
                    !labels.contains_key(&name) && !skipped.contains(&name)
                })
                .collect()
        } else {
            images
        };

        if working.is_empty() {
            return Err(MockupError::NothingToLabel(format!(
                "全{}枚がラベル済みまたはスキップ済みです",
                catalog.len()
            )));
        }

        let index = index.min(working.len() - 1);

        Ok(Self {
            catalog,
            images: working,
            index,
            pending: None,
            dirty: false,
            autosave: options.autosave,
            unlabeled_only: options.unlabeled_only,
            show_help: false,
            default_box_name: options.default_box_name,
            labels,
            skipped,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn current_path(&self) -> &Path {
        &self.images[self.index]
    }

    pub fn current_file(&self) -> String {
        file_name_of(self.current_path())
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        boxes_for(&self.labels, &self.current_file())
    }

    pub fn pending(&self) -> Option<&BoundingBox> {
        self.pending.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn autosave(&self) -> bool {
        self.autosave
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    pub fn default_box_name(&self) -> &str {
        &self.default_box_name
    }

    /// 現在の画像の状態記号（スキップ > 未保存 > ラベル済み > 未ラベル）
    pub fn glyph(&self) -> Glyph {
        let file = self.current_file();
        if self.skipped.contains(&file) {
            Glyph::Skipped
        } else if self.dirty {
            Glyph::Unsaved
        } else if self.labels.contains_key(&file) {
            Glyph::Labeled
        } else {
            Glyph::Unlabeled
        }
    }

    /// 元のカタログ全体で数えた進捗
    pub fn progress(&self) -> Progress {
        let mut labeled = 0;
        let mut skipped = 0;
        for name in &self.catalog {
            if self.skipped.contains(name) {
                skipped += 1;
            } else if self.labels.contains_key(name) {
                labeled += 1;
            }
        }
        Progress { total: self.catalog.len(), labeled, skipped }
    }

    /// 永続化用の状態（未ラベルのみの実行では位置を0で保存）
    pub fn session_state(&self) -> SessionState {
        SessionState {
            current_index: if self.unlabeled_only { 0 } else { self.index },
            skipped: self.skipped.clone(),
            images_snapshot: self.catalog.clone(),
        }
    }

    /// 現在の状態からステータスを組み立てる
    pub fn status(&self, message: Option<String>, tone: Tone) -> Status {
        let title = format!(
            "{}/{} {} — {}",
            self.index + 1,
            self.images.len(),
            self.glyph().symbol(),
            self.current_file()
        );
        let p = self.progress();
        let progress = format!(
            "Progress: {}/{} ({:.1}%)  |  Labeled: {}  Skipped: {}  Unlabeled: {}",
            p.done(),
            p.total,
            p.percent(),
            p.labeled,
            p.skipped,
            p.unlabeled()
        );
        Status { title, progress, message, tone }
    }

    /// コマンドを適用して新しいセッション値を返す
    pub fn apply(mut self, command: Command, sink: &mut impl SessionSink) -> Transition {
        let (message, tone) = match command {
            Command::SelectRegion { from, to } => self.select_region(from, to),
            Command::AddBox { name } => self.add_box(&name, sink),
            Command::Undo => self.undo(sink),
            Command::Clear => self.clear(sink),
            Command::Next => self.step(1, sink),
            Command::Previous => self.step(-1, sink),
            Command::NextUnlabeled => self.next_unlabeled(sink),
            Command::Skip => self.skip(sink),
            Command::Save => self.save(sink),
            Command::ToggleAutosave => {
                self.autosave = !self.autosave;
                (Some(format!("Autosave {}", if self.autosave { "ON" } else { "OFF" })), Tone::Good)
            }
            Command::ToggleHelp => {
                self.show_help = !self.show_help;
                (None, Tone::Good)
            }
        };

        let status = self.status(message, tone);
        Transition { session: self, status }
    }

    fn select_region(&mut self, from: (i64, i64), to: (i64, i64)) -> (Option<String>, Tone) {
        let rect = BoundingBox::from_corners(String::new(), from, to);
        if rect.width() < MIN_SPAN_PX || rect.height() < MIN_SPAN_PX {
            return (Some("Region too small.".into()), Tone::Bad);
        }
        let msg = format!("Region ({}, {})-({}, {}) selected.", rect.x1, rect.y1, rect.x2, rect.y2);
        self.pending = Some(rect);
        (Some(msg), Tone::Good)
    }

    fn add_box(&mut self, name: &str, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        let Some(mut rect) = self.pending.take() else {
            return (Some("Draw a rectangle first.".into()), Tone::Bad);
        };

        let name = name.trim();
        rect.name = if name.is_empty() { self.default_box_name.clone() } else { name.to_string() };

        let file = self.current_file();
        push_box(&mut self.labels, &file, rect);
        self.dirty = true;

        if self.autosave {
            self.save(sink)
        } else {
            (Some("Box added (not yet saved).".into()), Tone::Good)
        }
    }

    fn undo(&mut self, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        let file = self.current_file();
        if pop_box(&mut self.labels, &file).is_none() {
            return (Some("Nothing to undo.".into()), Tone::Bad);
        }
        self.dirty = true;

        if self.autosave {
            self.save(sink)
        } else {
            (Some("Undo done (not yet saved).".into()), Tone::Good)
        }
    }

    fn clear(&mut self, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        let file = self.current_file();
        clear_boxes(&mut self.labels, &file);
        self.dirty = true;

        if self.autosave {
            self.save(sink)
        } else {
            (Some("Cleared boxes (not yet saved).".into()), Tone::Good)
        }
    }

    fn skip(&mut self, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        self.skipped.insert(self.current_file());
        match sink.save_state(&self.session_state()) {
            Ok(merged) => self.skipped = merged.skipped,
            Err(e) => return (Some(format!("Skip not persisted: {}", e)), Tone::Bad),
        }

        match self.step(1, sink) {
            (None, tone) => (Some("Image skipped.".into()), tone),
            (Some(msg), tone) => (Some(format!("Image skipped. {}", msg)), tone),
        }
    }

    fn save(&mut self, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        match sink.save_labels(&self.labels) {
            Ok(()) => {
                self.dirty = false;
                self.persist_state(sink);
                let at = chrono::Local::now().format("%H:%M:%S");
                (Some(format!("Saved at {} ✓", at)), Tone::Good)
            }
            Err(e) => (Some(format!("Save failed: {}", e)), Tone::Bad),
        }
    }

    /// 未保存かつ自動保存ONなら移動前に保存する。失敗時はエラーメッセージを返す
    fn autosave_before_move(&mut self, sink: &mut impl SessionSink) -> Option<(Option<String>, Tone)> {
        if self.dirty && self.autosave {
            let (msg, tone) = self.save(sink);
            if tone == Tone::Bad {
                return Some((msg, tone));
            }
        }
        None
    }

    fn step(&mut self, delta: isize, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        if let Some(failed) = self.autosave_before_move(sink) {
            return failed;
        }

        let target = self.index as isize + delta;
        if target < 0 {
            return (Some("At first image.".into()), Tone::Good);
        }
        if target as usize >= self.images.len() {
            return (Some("Reached last image.".into()), Tone::Good);
        }

        self.move_to(target as usize, sink);
        (None, Tone::Good)
    }

    fn next_unlabeled(&mut self, sink: &mut impl SessionSink) -> (Option<String>, Tone) {
        let found = (self.index + 1..self.images.len()).find(|&i| {
            let name = file_name_of(&self.images[i]);
            !self.labels.contains_key(&name) && !self.skipped.contains(&name)
        });

        let Some(target) = found else {
            return (Some("No more unlabeled images.".into()), Tone::Good);
        };

        if let Some(failed) = self.autosave_before_move(sink) {
            return failed;
        }
        self.move_to(target, sink);
        (Some("Jumped to next unlabeled.".into()), Tone::Good)
    }

    /// 画像を切り替える（保留矩形と未保存フラグはリセット）
    fn move_to(&mut self, index: usize, sink: &mut impl SessionSink) {
        self.index = index;
        self.pending = None;
        self.dirty = false;
        self.persist_state(sink);
    }

    fn persist_state(&mut self, sink: &mut impl SessionSink) {
        match sink.save_state(&self.session_state()) {
            Ok(merged) => self.skipped = merged.skipped,
            Err(e) => warn!("セッション状態の保存に失敗: {}", e),
        }
    }
}
