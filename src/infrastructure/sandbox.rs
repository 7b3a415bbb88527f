//! # Local Sandbox
//!
//! `Sandbox` backed by a directory on the host. Virtual paths are resolved
//! against the root (`/` is the root itself) and may not escape it.
//! Processes run through `tokio::process` with merged stdout/stderr, each in
//! its own process group so a kill reaches everything the shell started.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::domain::traits::{ProcessEvent, ProcessHandle, Sandbox};

const READ_BUFFER: usize = 4096;

pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    /// Opens a sandbox rooted at `root`, which must already exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .with_context(|| format!("Sandbox root {} does not exist", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a virtual path onto the host, rejecting anything outside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut relative = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    if !relative.pop() {
                        bail!("Access denied: {path} escapes the sandbox");
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        let resolved = canonicalize_existing(&self.root.join(relative))?;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(anyhow!("Access denied: {path} resolves outside the sandbox"))
        }
    }
}

/// Canonicalizes the longest existing prefix of `path` and re-appends the rest,
/// so symlinks are followed even for files that do not exist yet.
fn canonicalize_existing(path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        if current.exists() {
            let mut resolved = current.canonicalize()?;
            for part in missing.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        let Some(name) = current.file_name().map(|n| n.to_owned()) else {
            bail!("Unable to resolve {}", path.display());
        };
        missing.push(name);
        if !current.pop() {
            bail!("Unable to resolve {}", path.display());
        }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let real = self.resolve(path)?;
        tokio::fs::read(&real)
            .await
            .with_context(|| format!("Failed to read {path}"))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let real = self.resolve(path)?;
        tokio::fs::write(&real, content)
            .await
            .with_context(|| format!("Failed to write {path}"))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let real = self.resolve(path)?;
        tokio::fs::create_dir_all(&real)
            .await
            .with_context(|| format!("Failed to create {path}"))
    }

    async fn spawn(
        &self,
        shell: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Box<dyn ProcessHandle>> {
        let mut command = Command::new(shell);
        command
            .args(args)
            .envs(env)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn {shell}"))?;
        // The shell leads its own group: its pid is the group id.
        let group = child.id();

        let (tx, output) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, tx));
        }
        let stdin = child.stdin.take();

        Ok(Box::new(LocalProcess {
            child,
            group,
            stdin,
            output,
            output_open: true,
        }))
    }
}

/// Pumps one pipe into the shared output channel until EOF.
async fn forward_output<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER];
    let mut pending = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let chunk = take_utf8(&mut pending);
                if !chunk.is_empty() && tx.send(chunk).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Process pipe closed: {}", e);
                break;
            }
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
    }
}

/// Drains the decodable prefix of `pending`, leaving a split multi-byte
/// sequence at the end for the next read.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let split = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(split);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

struct LocalProcess {
    child: Child,
    group: Option<u32>,
    stdin: Option<ChildStdin>,
    output: mpsc::UnboundedReceiver<String>,
    output_open: bool,
}

impl LocalProcess {
    /// SIGKILLs the whole process group, grandchildren included.
    #[cfg(unix)]
    fn kill_group(&self) -> bool {
        let Some(pgid) = self.group.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
            return false;
        };
        // SAFETY: kill(2) takes no pointers; a negative pid addresses the group.
        unsafe { libc::kill(-pgid, libc::SIGKILL) == 0 }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) -> bool {
        false
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    // Killed by a signal: no exit code.
    status.code().unwrap_or(-1)
}

#[async_trait]
impl ProcessHandle for LocalProcess {
    async fn next_event(&mut self) -> Result<ProcessEvent> {
        while self.output_open {
            tokio::select! {
                biased;
                chunk = self.output.recv() => match chunk {
                    Some(chunk) => return Ok(ProcessEvent::Output(chunk)),
                    None => self.output_open = false,
                },
                status = self.child.wait() => {
                    let status = status.context("Failed to wait for process")?;
                    return Ok(ProcessEvent::Exited(exit_code(status)));
                }
            }
        }
        Ok(ProcessEvent::Exited(self.wait().await?))
    }

    async fn next_output(&mut self) -> Option<String> {
        self.output.recv().await
    }

    async fn write_input(&mut self, data: &str) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            bail!("Process stdin is closed");
        };
        stdin.write_all(data.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await.context("Failed to wait for process")?;
        Ok(exit_code(status))
    }

    fn kill(&mut self) {
        if self.kill_group() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Kill failed (process already gone?): {}", e);
        }
    }
}

impl Drop for LocalProcess {
    fn drop(&mut self) {
        // `kill_on_drop` only reaches the shell. Anything it left behind after
        // exiting normally is intentionally kept alive.
        if self.child.id().is_some() {
            self.kill_group();
        }
    }
}
