//! 対話式ラベリング（ターミナル版）
//!
//! 1行ずつショートカットを受け付け、`Session::apply` に渡して結果を表示する。

use super::controller::{Command, Session, SessionSink, Status, Tone};
use crate::error::{MockupError, Result};
use dialoguer::{Confirm, Input};

const HELP: &str = "\
操作:
  r x1 y1 x2 y2  矩形を選択
  a / Enter      選択中の矩形を追加
  name <名前>    次に追加するボックス名
  u              取り消し
  c              この画像のボックスを全削除
  n / p          次 / 前の画像
  g              次の未ラベル画像へ
  k              この画像をスキップ
  s              保存
  t              自動保存の切り替え
  h              ヘルプ表示の切り替え
  q              終了";

/// 入力行の解釈結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortcut {
    Apply(Command),
    /// 矩形選択（画像サイズの検証前）
    Region((i64, i64), (i64, i64)),
    /// 追加時のボックス名を変更
    Name(String),
    Add,
    Quit,
    Invalid(String),
}

/// 1行の入力をショートカットに変換
pub fn parse_shortcut(line: &str) -> Shortcut {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or("");

    match head {
        "" | "a" => Shortcut::Add,
        "r" => {
            let coords: Vec<i64> = parts.filter_map(|p| p.parse().ok()).collect();
            if coords.len() != 4 {
                return Shortcut::Invalid("r には座標が4つ必要です (r x1 y1 x2 y2)".into());
            }
            Shortcut::Region((coords[0], coords[1]), (coords[2], coords[3]))
        }
        "name" => {
            let name = trimmed["name".len()..].trim();
            if name.is_empty() {
                Shortcut::Invalid("ボックス名が空です".into())
            } else {
                Shortcut::Name(name.to_string())
            }
        }
        "u" => Shortcut::Apply(Command::Undo),
        "c" => Shortcut::Apply(Command::Clear),
        "n" => Shortcut::Apply(Command::Next),
        "p" => Shortcut::Apply(Command::Previous),
        "g" => Shortcut::Apply(Command::NextUnlabeled),
        "k" => Shortcut::Apply(Command::Skip),
        "s" => Shortcut::Apply(Command::Save),
        "t" => Shortcut::Apply(Command::ToggleAutosave),
        "h" => Shortcut::Apply(Command::ToggleHelp),
        "q" | "Q" => Shortcut::Quit,
        other => Shortcut::Invalid(format!("不明な操作: {}", other)),
    }
}

/// 矩形が画像の範囲内か
pub fn region_within(from: (i64, i64), to: (i64, i64), width: u32, height: u32) -> bool {
    let inside = |(x, y): (i64, i64)| x >= 0 && y >= 0 && x <= width as i64 && y <= height as i64;
    inside(from) && inside(to)
}

fn print_status(session: &Session, status: &Status) {
    println!();
    println!("[{}]", status.title);
    for (i, b) in session.boxes().iter().enumerate() {
        println!("  {}. {} ({}, {})-({}, {})", i + 1, b.name, b.x1, b.y1, b.x2, b.y2);
    }
    if let Some(p) = session.pending() {
        println!("  選択中: ({}, {})-({}, {})", p.x1, p.y1, p.x2, p.y2);
    }
    match status.tone {
        Tone::Good => println!("{}", status.status_line()),
        Tone::Bad => println!("✗ {}", status.status_line()),
    }
}

/// 終了までプロンプトを回す
pub fn run_terminal(mut session: Session, sink: &mut impl SessionSink) -> Result<Session> {
    println!("{}", HELP);
    let mut box_name = session.default_box_name().to_string();
    let mut status = session.status(None, Tone::Good);

    loop {
        print_status(&session, &status);

        let line: String = Input::new()
            .with_prompt(format!("操作 (ボックス名: {})", box_name))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| MockupError::CliExecution(e.to_string()))?;

        let command = match parse_shortcut(&line) {
            Shortcut::Apply(command) => command,
            Shortcut::Add => Command::AddBox { name: box_name.clone() },
            Shortcut::Name(name) => {
                box_name = name;
                status = session.status(Some(format!("Box name: {}", box_name)), Tone::Good);
                continue;
            }
            Shortcut::Region(from, to) => {
                let (w, h) = image::image_dimensions(session.current_path())
                    .map_err(|e| MockupError::ImageLoad(format!("{}: {}", session.current_path().display(), e)))?;
                if !region_within(from, to, w, h) {
                    status = session.status(Some(format!("Region outside image ({}x{}).", w, h)), Tone::Bad);
                    continue;
                }
                Command::SelectRegion { from, to }
            }
            Shortcut::Invalid(msg) => {
                status = session.status(Some(msg), Tone::Bad);
                continue;
            }
            Shortcut::Quit => {
                if session.is_dirty() {
                    let discard = Confirm::new()
                        .with_prompt("未保存の変更があります。保存せずに終了しますか？")
                        .default(false)
                        .interact()
                        .map_err(|e| MockupError::CliExecution(e.to_string()))?;
                    if !discard {
                        status = session.status(None, Tone::Good);
                        continue;
                    }
                }
                return Ok(session);
            }
        };

        let toggled_help = command == Command::ToggleHelp;
        let transition = session.apply(command, sink);
        session = transition.session;
        status = transition.status;

        if toggled_help && session.show_help() {
            println!("{}", HELP);
        }
    }
}
