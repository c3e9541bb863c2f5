//! 商品画像のファイル名をカタログの `imageFile` に合わせる
//!
//! 名前は小文字英数字に正規化し、配置トークン（rightchest / bigback / fullfront）を
//! 除いて比較する。共通接頭辞の長さ ×10 に前後配置のボーナスを加えた点数で選ぶ。

use crate::error::{MockupError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PLACEMENT_TOKENS: &[&str] = &["rightchest", "bigback", "fullfront"];

lazy_static! {
    static ref IMAGE_FILE_RE: Regex = Regex::new(r"imageFile\s*:\s*'([^']+)'").unwrap();
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]").unwrap();
}

/// 商品定義から `imageFile` を出現順・重複なしで取り出す
pub fn target_names(products_source: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    IMAGE_FILE_RE
        .captures_iter(products_source)
        .map(|c| c[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// 拡張子と配置トークンを除いた比較用の名前
pub fn normalize_root(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut norm = NON_ALNUM_RE.replace_all(&stem, "").to_string();
    for token in PLACEMENT_TOKENS {
        norm = norm.replace(token, "");
    }
    norm
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// 候補の点数
pub fn score_candidate(target: &str, candidate: &str) -> i64 {
    let base = common_prefix_len(&normalize_root(target), &normalize_root(candidate)) as i64;

    let t = target.to_lowercase();
    let (t_right, t_back, t_full) = (t.contains("right_chest"), t.contains("big_back"), t.contains("full_front"));
    let c = candidate.to_lowercase();
    let (c_back, c_front) = (c.contains("back"), c.contains("front"));

    let mut bonus = 0;
    if t_back && c_back {
        bonus += 6;
    }
    if (t_right || t_full) && c_front {
        bonus += 4;
    }
    if t_back && c_front {
        bonus -= 2;
    }
    if (t_right || t_full) && c_back {
        bonus -= 2;
    }
    base * 10 + bonus
}

/// リネーム計画
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub renames: Vec<(String, String)>,
    pub already_present: Vec<String>,
    pub not_found: Vec<String>,
}

/// 対象ごとに最良の候補を選ぶ（同じ元ファイルは再利用しない）
///
/// 同点なら短い名前、さらに同じなら辞書順で先のものを選ぶ。
pub fn plan_renames(targets: &[String], existing: &[String]) -> RenamePlan {
    let present: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let wanted: HashSet<&str> = targets.iter().map(String::as_str).collect();
    // 既に正しい名前のファイルは元ファイル候補にしない
    let mut available: Vec<&String> = existing.iter().filter(|n| !wanted.contains(n.as_str())).collect();
    available.sort();
    let mut plan = RenamePlan::default();

    for target in targets {
        if present.contains(target.as_str()) {
            plan.already_present.push(target.clone());
            continue;
        }

        let best = available
            .iter()
            .enumerate()
            .map(|(i, cand)| (i, score_candidate(target, cand)))
            .max_by(|(ia, sa), (ib, sb)| {
                sa.cmp(sb)
                    .then_with(|| available[*ib].len().cmp(&available[*ia].len()))
                    .then_with(|| available[*ib].cmp(available[*ia]))
            });

        let Some((idx, _)) = best else {
            plan.not_found.push(target.clone());
            continue;
        };

        let t_norm = normalize_root(target);
        let overlap = common_prefix_len(&t_norm, &normalize_root(available[idx]));
        let min_required = (t_norm.chars().count() / 2).min(10);
        if overlap < min_required {
            plan.not_found.push(target.clone());
            continue;
        }

        let source = available.remove(idx);
        plan.renames.push((source.clone(), target.clone()));
    }
    plan
}

/// 実行結果
#[derive(Debug, Default)]
pub struct RenameReport {
    pub plan: RenamePlan,
    pub errors: Vec<(String, String)>,
    pub dry_run: bool,
}

impl RenameReport {
    pub fn print(&self) {
        println!("\n==== リネーム結果 ====");
        for (src, dst) in &self.plan.renames {
            if self.errors.iter().any(|(s, _)| s == src) {
                continue;
            }
            let mark = if self.dry_run { "(dry-run)" } else { "✔" };
            println!("{} {} -> {}", mark, src, dst);
        }
        if !self.plan.already_present.is_empty() {
            println!("\nスキップ（既に存在）:");
            for t in &self.plan.already_present {
                println!("- {}", t);
            }
        }
        if !self.plan.not_found.is_empty() {
            println!("\n候補なし:");
            for t in &self.plan.not_found {
                println!("- {}", t);
            }
        }
        if !self.errors.is_empty() {
            println!("\nエラー:");
            for (src, why) in &self.errors {
                println!("- {} -> {}", src, why);
            }
        }
    }
}

/// 画像フォルダ直下のファイル名
fn list_files(images_dir: &Path) -> Result<Vec<String>> {
    if !images_dir.is_dir() {
        return Err(MockupError::FolderNotFound(images_dir.display().to_string()));
    }
    let mut names: Vec<String> = std::fs::read_dir(images_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// 商品定義ファイルを読み、画像フォルダのファイルをリネームする
pub fn rename_to_catalog(products_file: &Path, images_dir: &Path, dry_run: bool) -> Result<RenameReport> {
    if !products_file.is_file() {
        return Err(MockupError::FileNotFound(products_file.display().to_string()));
    }
    let targets = target_names(&std::fs::read_to_string(products_file)?);
    if targets.is_empty() {
        return Err(MockupError::Config(format!(
            "imageFile の指定が見つかりません: {}",
            products_file.display()
        )));
    }
    let existing = list_files(images_dir)?;
    info!("対象 {}件 / 既存ファイル {}件", targets.len(), existing.len());

    let plan = plan_renames(&targets, &existing);
    let mut errors = Vec::new();
    if !dry_run {
        for (src, dst) in &plan.renames {
            let from: PathBuf = images_dir.join(src);
            let to: PathBuf = images_dir.join(dst);
            if let Err(e) = std::fs::rename(&from, &to) {
                warn!("リネーム失敗 {} -> {}: {}", src, dst, e);
                errors.push((src.clone(), format!("{} ({})", dst, e)));
            }
        }
    }

    Ok(RenameReport { plan, errors, dry_run })
}
