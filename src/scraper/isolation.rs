//! 子プロセス隔離による取得
//!
//! 1サイトごとに子プロセスを起動し、親はタイムアウト付きで結果行を待つ。
//! 子がどこで止まっても、親は `timeout + grace` 程度で必ず戻る。
//!
//! 状態遷移: `Spawned → Running → Completed | TimedOut → Terminated | Killed`

use mockup_common::ScrapeOutcome;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

/// 起動する子プロセスのコマンドライン（URL は最後の引数として渡す）
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self { program: program.into(), args: Vec::new(), envs: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// 実行中のバイナリ自身の `fetch-worker` サブコマンド
    pub fn fetch_worker(output_dir: &Path) -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe)
            .arg("fetch-worker")
            .arg("--output-dir")
            .arg(output_dir.as_os_str()))
    }
}

/// 子プロセスの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Spawned,
    Running,
    /// 結果行を読み終えた（または出力が閉じられた）
    Completed,
    TimedOut,
    /// 終了要求で自発的に終了した
    Terminated,
    /// 強制終了した
    Killed,
}

/// 1回の隔離実行の結果
#[derive(Debug, Clone)]
pub struct IsolatedRun {
    pub outcome: ScrapeOutcome,
    pub phases: Vec<WorkerPhase>,
}

impl IsolatedRun {
    pub fn final_phase(&self) -> Option<WorkerPhase> {
        self.phases.last().copied()
    }
}

/// 子プロセスで1サイトを取得する
pub async fn run_isolated(command: &WorkerCommand, url: &str, timeout: Duration, grace: Duration) -> IsolatedRun {
    let started = Instant::now();
    let mut phases = Vec::new();

    let spawned = Command::new(&command.program)
        .args(&command.args)
        .arg(url)
        .envs(command.envs.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let mut outcome = ScrapeOutcome::failed(url, format!("Failed to start worker: {}", e));
            outcome.duration = started.elapsed().as_secs_f64();
            return IsolatedRun { outcome, phases };
        }
    };
    phases.push(WorkerPhase::Spawned);

    // stdin は終了要求用のパイプ。drop すると子は EOF を受けて終了する
    let control = child.stdin.take();
    let Some(stdout) = child.stdout.take() else {
        drop(control);
        let phase = shutdown(&mut child, grace).await;
        phases.push(phase);
        let mut outcome = ScrapeOutcome::failed(url, "Worker stdout unavailable");
        outcome.duration = started.elapsed().as_secs_f64();
        return IsolatedRun { outcome, phases };
    };
    phases.push(WorkerPhase::Running);

    let mut outcome = match tokio::time::timeout(timeout, read_result(stdout)).await {
        Ok(result) => {
            phases.push(WorkerPhase::Completed);
            drop(control);
            if let Err(e) = tokio::time::timeout(grace, child.wait()).await {
                debug!("結果後も子プロセスが残っているため強制終了: {}", e);
                kill(&mut child).await;
                phases.push(WorkerPhase::Killed);
            }
            let elapsed = started.elapsed().as_secs_f64();
            result.unwrap_or_else(|| {
                ScrapeOutcome::failed(url, format!("Process completed but no result after {:.1}s", elapsed))
            })
        }
        Err(_) => {
            phases.push(WorkerPhase::TimedOut);
            drop(control);
            let phase = shutdown(&mut child, grace).await;
            phases.push(phase);
            let elapsed = started.elapsed().as_secs_f64();
            warn!("タイムアウト ({:.1}s): {}", elapsed, url);
            ScrapeOutcome::failed(url, format!("Hard timeout after {:.1}s - process killed", elapsed))
        }
    };

    outcome.duration = started.elapsed().as_secs_f64();
    IsolatedRun { outcome, phases }
}

/// 最初に現れた結果行を返す（出力が閉じられたら None）
async fn read_result(stdout: ChildStdout) -> Option<ScrapeOutcome> {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<ScrapeOutcome>(line.trim()) {
            Ok(outcome) => return Some(outcome),
            Err(_) => debug!("結果行ではない出力を無視: {}", line),
        }
    }
    None
}

/// 終了要求後 grace だけ待ち、残っていれば強制終了
async fn shutdown(child: &mut Child, grace: Duration) -> WorkerPhase {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => WorkerPhase::Terminated,
        Err(_) => {
            kill(child).await;
            WorkerPhase::Killed
        }
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("子プロセスの強制終了に失敗: {}", e);
    }
}
