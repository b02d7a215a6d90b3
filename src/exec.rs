//! Code execution sandbox
//!
//! Writes a selected code block to a content-addressed file under a
//! dedicated temp subdirectory and runs it with a local interpreter,
//! streaming output back as events. Identical code text reuses the same
//! backing file; files live for the life of the process and are never
//! deleted. One execution failing is reported through events and never
//! takes the host down.

use crate::error::ExecError;
use crate::logging;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

/// Wall-clock limit per execution.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Events streamed back to the caller. Per-stream arrival order is
/// preserved; there is no ordering guarantee between stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    /// One line of subprocess stdout.
    Stdout(String),
    /// One line of subprocess stderr, or a stream-level read error.
    Stderr(String),
    /// Staging or spawning failed; nothing ran.
    Failed(String),
    /// Subprocess finished within the timeout.
    Exited(Option<i32>),
    /// Subprocess exceeded the execution timeout and was killed.
    TimedOut,
}

/// Map a fence language tag to the source-file extension it runs as, or
/// `None` when the language is not runnable.
pub fn runnable_ext(tag: &str) -> Option<&'static str> {
    match tag {
        "ts" | "typescript" => Some("ts"),
        "tsx" | "typescriptreact" => Some("tsx"),
        "js" | "javascript" => Some("js"),
        "mjs" => Some("mjs"),
        "sh" | "bash" | "shell" => Some("sh"),
        _ => None,
    }
}

fn interpreter(ext: &str) -> &'static str {
    match ext {
        "ts" | "tsx" => "tsx",
        "sh" => "sh",
        _ => "node",
    }
}

pub struct Sandbox {
    workdir: PathBuf,
    /// Wall-clock limit per execution, [`EXEC_TIMEOUT`] unless overridden.
    timeout: Duration,
    /// Content id -> staged file, append-only for the process lifetime.
    staged: Mutex<HashMap<String, PathBuf>>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::with_workdir(std::env::temp_dir().join(".mdeck"))
    }
}

impl Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workdir(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: EXEC_TIMEOUT,
            staged: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Stable identifier for a piece of code text.
    pub fn content_id(code: &str) -> String {
        let digest = Sha256::digest(code.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Write `code` to `<workdir>/<id>.<ext>` unless a file for that id
    /// already exists. Returns the backing path.
    pub fn stage(&self, code: &str, ext: &str) -> Result<PathBuf, ExecError> {
        let id = Self::content_id(code);
        {
            let staged = self.staged.lock().unwrap();
            if let Some(path) = staged.get(&id) {
                return Ok(path.clone());
            }
        }

        std::fs::create_dir_all(&self.workdir).map_err(|source| ExecError::Workdir {
            path: self.workdir.clone(),
            source,
        })?;
        let path = self.workdir.join(format!("{}.{}", id, ext));
        std::fs::write(&path, code).map_err(|source| ExecError::Write {
            path: path.clone(),
            source,
        })?;

        self.staged.lock().unwrap().insert(id, path.clone());
        Ok(path)
    }

    /// Run `code` under the interpreter for `lang`, streaming output as
    /// events. Returns immediately; must be called within a tokio runtime.
    pub fn execute(&self, code: &str, lang: &str) -> UnboundedReceiver<ExecEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        let Some(ext) = runnable_ext(lang) else {
            let _ = tx.send(ExecEvent::Failed(
                ExecError::NotRunnable(lang.to_string()).to_string(),
            ));
            return rx;
        };

        let path = match self.stage(code, ext) {
            Ok(path) => path,
            Err(err) => {
                logging::error(&format!("exec staging failed: {}", err));
                let _ = tx.send(ExecEvent::Failed(err.to_string()));
                return rx;
            }
        };

        let workdir = self.workdir.clone();
        let program = interpreter(ext);
        tokio::spawn(run_child(program, path, workdir, self.timeout, tx));
        rx
    }
}

async fn run_child(
    program: &'static str,
    path: PathBuf,
    workdir: PathBuf,
    limit: Duration,
    tx: UnboundedSender<ExecEvent>,
) {
    let spawned = Command::new(program)
        .arg(&path)
        .current_dir(&workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            let _ = tx.send(ExecEvent::Failed(format!(
                "failed to spawn {}: {}",
                program, err
            )));
            return;
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_task = tokio::spawn(pump_lines(stdout, tx.clone(), ExecEvent::Stdout));
    let err_task = tokio::spawn(pump_lines(stderr, tx.clone(), ExecEvent::Stderr));

    match timeout(limit, child.wait()).await {
        Ok(Ok(status)) => {
            // Drain both streams before reporting completion.
            let _ = out_task.await;
            let _ = err_task.await;
            let _ = tx.send(ExecEvent::Exited(status.code()));
        }
        Ok(Err(err)) => {
            let _ = out_task.await;
            let _ = err_task.await;
            let _ = tx.send(ExecEvent::Stderr(format!("wait failed: {}", err)));
            let _ = tx.send(ExecEvent::Exited(None));
        }
        Err(_) => {
            let _ = child.kill().await;
            out_task.abort();
            err_task.abort();
            let _ = tx.send(ExecEvent::TimedOut);
        }
    }
}

async fn pump_lines<R>(
    stream: Option<R>,
    tx: UnboundedSender<ExecEvent>,
    wrap: fn(String) -> ExecEvent,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(stream) = stream else { return };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let _ = tx.send(wrap(line));
            }
            Ok(None) => break,
            Err(err) => {
                let _ = tx.send(ExecEvent::Stderr(format!("stream error: {}", err)));
                break;
            }
        }
    }
}
