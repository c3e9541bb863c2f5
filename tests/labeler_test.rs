//! ラベリングの結合テスト
//!
//! 実ファイル（ラベル・状態）を使ってセッションを往復させる

use mockup_common::{BoundingBox, ImageLabels, LabelMap, SessionState};
use mockup_kit::error::MockupError;
use mockup_kit::labeler::{
    open_session, Command, FileSink, LabelStore, LabelerOptions, SessionSink, SessionStore,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_catalog(dir: &Path, names: &[&str]) {
    for name in names {
        image::RgbImage::new(64, 48).save(dir.join(name)).unwrap();
    }
}

fn options(root: &Path, work: &Path) -> LabelerOptions {
    LabelerOptions {
        images_root: root.to_path_buf(),
        logos_json: work.join("logos.json"),
        state_json: work.join("labeler_state.json"),
        autosave: false,
        resume: false,
        unlabeled_only: false,
        default_box_name: "logo_area".into(),
    }
}

fn sink_for(options: &LabelerOptions) -> FileSink {
    FileSink::new(LabelStore::new(&options.logos_json), SessionStore::new(&options.state_json))
}

/// ラベルファイルの保存と再読み込み
#[test]
fn test_label_store_roundtrip_with_backup() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = LabelStore::new(dir.path().join("logos.json"));

    let mut labels = LabelMap::new();
    labels.insert(
        "shirt.png".into(),
        ImageLabels { boxes: vec![BoundingBox::from_corners("logo_area", (10, 10), (40, 30))] },
    );

    // 初回はバックアップなし
    assert!(store.save(&labels).unwrap().is_none());
    assert_eq!(store.load(), labels);

    // 2回目は直前の内容がバックアップされる
    labels.remove("shirt.png");
    let backup = store.save(&labels).unwrap().expect("バックアップが作成されていません");
    assert!(backup.exists());
    let backed_up: LabelMap = serde_json::from_str(&fs::read_to_string(&backup).unwrap()).unwrap();
    assert!(backed_up.contains_key("shirt.png"));
    assert!(store.load().is_empty());
}

/// 4スペースインデントで保存される
#[test]
fn test_label_file_format() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = LabelStore::new(dir.path().join("logos.json"));
    let mut labels = LabelMap::new();
    labels.insert(
        "a.png".into(),
        ImageLabels { boxes: vec![BoundingBox::from_corners("logo_area", (1, 2), (30, 40))] },
    );
    store.save(&labels).unwrap();

    let content = fs::read_to_string(store.path()).unwrap();
    assert!(content.contains("\n    \"a.png\""));
    assert!(content.contains("\"x2\": 30"));
}

/// 壊れたラベルファイルは空として扱う
#[test]
fn test_corrupt_label_file_is_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("logos.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(LabelStore::new(&path).load().is_empty());
}

/// 空のフォルダはエラー
#[test]
fn test_open_empty_catalog() {
    let images = tempdir().expect("Failed to create temp dir");
    let work = tempdir().expect("Failed to create temp dir");
    let result = open_session(&options(images.path(), work.path()));
    assert!(matches!(result, Err(MockupError::NoImagesFound(_))));
}

/// ラベル付け・スキップ・再開
#[test]
fn test_session_resume_through_files() {
    let images = tempdir().expect("Failed to create temp dir");
    let work = tempdir().expect("Failed to create temp dir");
    write_catalog(images.path(), &["a.png", "b.png", "c.png"]);
    let opts = options(images.path(), work.path());
    let mut sink = sink_for(&opts);

    let session = open_session(&opts).unwrap();
    assert_eq!(session.current_file(), "a.png");

    let session = session.apply(Command::SelectRegion { from: (5, 5), to: (30, 20) }, &mut sink).session;
    let session = session.apply(Command::AddBox { name: "logo_area".into() }, &mut sink).session;
    let transition = session.apply(Command::Save, &mut sink);
    assert!(transition.status.message.as_deref().unwrap_or("").starts_with("Saved at"));

    let session = transition.session.apply(Command::Next, &mut sink).session;
    assert_eq!(session.current_file(), "b.png");
    let session = session.apply(Command::Skip, &mut sink).session;
    assert_eq!(session.current_file(), "c.png");

    // 再開すると位置とスキップが戻る
    let mut resume_opts = opts.clone();
    resume_opts.resume = true;
    let resumed = open_session(&resume_opts).unwrap();
    assert_eq!(resumed.current_file(), "c.png");
    assert!(resumed.skipped().contains("b.png"));
    assert_eq!(resumed.boxes().len(), 0);
    assert!(resumed.labels().contains_key("a.png"));

    let p = resumed.progress();
    assert_eq!((p.total, p.labeled, p.skipped), (3, 1, 1));
    assert!(p.done() <= p.total);
}

/// 未ラベルのみモード
#[test]
fn test_unlabeled_only() {
    let images = tempdir().expect("Failed to create temp dir");
    let work = tempdir().expect("Failed to create temp dir");
    write_catalog(images.path(), &["a.png", "b.png", "c.png"]);
    let mut opts = options(images.path(), work.path());

    let mut labels = LabelMap::new();
    labels.insert(
        "a.png".into(),
        ImageLabels { boxes: vec![BoundingBox::from_corners("logo_area", (0, 0), (10, 10))] },
    );
    LabelStore::new(&opts.logos_json).save(&labels).unwrap();
    SessionStore::new(&opts.state_json)
        .save_merged(&SessionState { skipped: ["c.png".to_string()].into(), ..Default::default() })
        .unwrap();

    opts.resume = true;
    opts.unlabeled_only = true;
    let session = open_session(&opts).unwrap();
    assert_eq!(session.len(), 1);
    assert_eq!(session.current_file(), "b.png");
    assert_eq!(session.session_state().current_index, 0);

    // 最後の1枚もスキップすると対象がなくなる
    let mut sink = sink_for(&opts);
    session.apply(Command::Skip, &mut sink);
    assert!(matches!(open_session(&opts), Err(MockupError::NothingToLabel(_))));
}

/// 別セッションのスキップは消えない
#[test]
fn test_state_merge_keeps_other_skips() {
    let work = tempdir().expect("Failed to create temp dir");
    let store = SessionStore::new(work.path().join("state.json"));
    let mut sink = FileSink::new(LabelStore::new(work.path().join("logos.json")), store.clone());

    sink.save_state(&SessionState { current_index: 4, skipped: ["x.png".to_string()].into(), ..Default::default() })
        .unwrap();
    let merged = sink
        .save_state(&SessionState { current_index: 1, skipped: ["y.png".to_string()].into(), ..Default::default() })
        .unwrap();
    assert!(merged.skipped.contains("x.png"));

    let state = store.load();
    assert_eq!(state.current_index, 1);
    assert!(state.skipped.contains("x.png"));
    assert!(state.skipped.contains("y.png"));
}
