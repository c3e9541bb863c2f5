//! ラベルデータ（バウンディングボックス）の型定義
//!
//! ラベルファイルの形式:
//! `{ "<filename>": { "boxes": [ {"name", "x1", "y1", "x2", "y2"} ] } }`
//!
//! ボックスが0件になったエントリは保持せず削除する。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ボックス名の既定値
pub const DEFAULT_BOX_NAME: &str = "logo_area";

/// 名前付き矩形（画素座標）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub name: String,
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    /// 2点から矩形を作る（x1<=x2, y1<=y2 に並べ替え）
    pub fn from_corners(name: impl Into<String>, a: (i64, i64), b: (i64, i64)) -> Self {
        Self {
            name: name.into(),
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        }
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }
}

/// 1画像分のラベル
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLabels {
    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
}

/// ファイル名 → ラベル
pub type LabelMap = BTreeMap<String, ImageLabels>;

/// ボックスを追加（エントリがなければ作成）
pub fn push_box(labels: &mut LabelMap, file_name: &str, bbox: BoundingBox) {
    labels
        .entry(file_name.to_string())
        .or_default()
        .boxes
        .push(bbox);
}

/// 最後に追加したボックスを取り除く
///
/// リストが空になったらエントリごと削除する。
pub fn pop_box(labels: &mut LabelMap, file_name: &str) -> Option<BoundingBox> {
    let entry = labels.get_mut(file_name)?;
    let popped = entry.boxes.pop();
    if entry.boxes.is_empty() {
        labels.remove(file_name);
    }
    popped
}

/// 画像のボックスを全削除（エントリも削除）
pub fn clear_boxes(labels: &mut LabelMap, file_name: &str) -> usize {
    labels
        .remove(file_name)
        .map(|entry| entry.boxes.len())
        .unwrap_or(0)
}

/// 画像のボックス一覧
pub fn boxes_for<'a>(labels: &'a LabelMap, file_name: &str) -> &'a [BoundingBox] {
    labels
        .get(file_name)
        .map(|entry| entry.boxes.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_box(name: &str) -> BoundingBox {
        BoundingBox::from_corners(name, (10, 20), (110, 80))
    }

    #[test]
    fn test_from_corners_sorts_coordinates() {
        let b = BoundingBox::from_corners("chest", (300, 40), (120, 10));
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (120, 10, 300, 40));
        assert_eq!(b.width(), 180);
        assert_eq!(b.height(), 30);
    }

    #[test]
    fn test_push_then_pop_restores_map() {
        let mut labels = LabelMap::new();
        push_box(&mut labels, "a.jpg", sample_box("first"));
        let before = labels.clone();

        push_box(&mut labels, "a.jpg", sample_box("second"));
        let popped = pop_box(&mut labels, "a.jpg").unwrap();

        assert_eq!(popped.name, "second");
        assert_eq!(labels, before);
    }

    #[test]
    fn test_pop_last_box_removes_entry() {
        let mut labels = LabelMap::new();
        push_box(&mut labels, "a.jpg", sample_box("only"));
        pop_box(&mut labels, "a.jpg");
        assert!(!labels.contains_key("a.jpg"));
        assert!(pop_box(&mut labels, "a.jpg").is_none());
    }

    #[test]
    fn test_clear_removes_entry() {
        let mut labels = LabelMap::new();
        push_box(&mut labels, "a.jpg", sample_box("one"));
        push_box(&mut labels, "a.jpg", sample_box("two"));
        assert_eq!(clear_boxes(&mut labels, "a.jpg"), 2);
        assert!(!labels.contains_key("a.jpg"));
        assert_eq!(clear_boxes(&mut labels, "a.jpg"), 0);
    }

    #[test]
    fn test_label_file_format() {
        let json = r#"{
            "cap_front.jpg": {"boxes": [{"name": "logo_area", "x1": 1, "y1": 2, "x2": 30, "y2": 40}]}
        }"#;
        let labels: LabelMap = serde_json::from_str(json).expect("パース失敗");
        let boxes = boxes_for(&labels, "cap_front.jpg");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].name, DEFAULT_BOX_NAME);
        assert_eq!(boxes[0].x2, 30);
        assert!(boxes_for(&labels, "missing.jpg").is_empty());
    }
}
