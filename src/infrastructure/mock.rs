//! In-memory sandbox for testing.
//!
//! Records every filesystem call and serves scripted processes, making it easy
//! to write deterministic tests for the runners and the executor.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::domain::traits::{ProcessEvent, ProcessHandle, Sandbox};

/// Exit code reported by a scripted process after `kill()`.
pub const KILLED_EXIT_CODE: i32 = 137;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    Output(String),
    Exit(i32),
}

/// One recorded `spawn` call.
#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub shell: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl SpawnRecord {
    pub fn command(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }
}

/// Test-side controls of a scripted process.
#[derive(Clone)]
pub struct ScriptHandle {
    tx: mpsc::UnboundedSender<ScriptEvent>,
    killed: Arc<AtomicBool>,
    input: Arc<Mutex<Vec<String>>>,
}

impl ScriptHandle {
    pub fn output(&self, chunk: &str) -> &Self {
        let _ = self.tx.send(ScriptEvent::Output(chunk.to_string()));
        self
    }

    pub fn exit(&self, code: i32) {
        let _ = self.tx.send(ScriptEvent::Exit(code));
    }

    pub fn killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn input(&self) -> Vec<String> {
        self.input.lock().unwrap().clone()
    }
}

struct ScriptedProcess {
    rx: mpsc::UnboundedReceiver<ScriptEvent>,
    exit: Option<i32>,
    killed: Arc<AtomicBool>,
    input: Arc<Mutex<Vec<String>>>,
}

fn scripted() -> (ScriptHandle, ScriptedProcess) {
    let (tx, rx) = mpsc::unbounded_channel();
    let killed = Arc::new(AtomicBool::new(false));
    let input = Arc::new(Mutex::new(Vec::new()));
    let handle = ScriptHandle {
        tx,
        killed: killed.clone(),
        input: input.clone(),
    };
    let process = ScriptedProcess {
        rx,
        exit: None,
        killed,
        input,
    };
    (handle, process)
}

#[async_trait]
impl ProcessHandle for ScriptedProcess {
    async fn next_event(&mut self) -> Result<ProcessEvent> {
        if self.killed.load(Ordering::SeqCst) {
            return Ok(ProcessEvent::Exited(KILLED_EXIT_CODE));
        }
        if let Some(code) = self.exit {
            return Ok(ProcessEvent::Exited(code));
        }
        match self.rx.recv().await {
            Some(ScriptEvent::Output(chunk)) => Ok(ProcessEvent::Output(chunk)),
            Some(ScriptEvent::Exit(code)) => {
                self.exit = Some(code);
                Ok(ProcessEvent::Exited(code))
            }
            None => Ok(ProcessEvent::Exited(0)),
        }
    }

    async fn next_output(&mut self) -> Option<String> {
        if self.exit.is_some() || self.killed.load(Ordering::SeqCst) {
            return None;
        }
        match self.rx.recv().await {
            Some(ScriptEvent::Output(chunk)) => Some(chunk),
            Some(ScriptEvent::Exit(code)) => {
                self.exit = Some(code);
                None
            }
            None => None,
        }
    }

    async fn write_input(&mut self, data: &str) -> Result<()> {
        self.input.lock().unwrap().push(data.to_string());
        Ok(())
    }

    async fn wait(&mut self) -> Result<i32> {
        if self.killed.load(Ordering::SeqCst) {
            return Ok(KILLED_EXIT_CODE);
        }
        if let Some(code) = self.exit {
            return Ok(code);
        }
        while let Some(event) = self.rx.recv().await {
            if let ScriptEvent::Exit(code) = event {
                self.exit = Some(code);
                return Ok(code);
            }
        }
        Ok(0)
    }

    fn kill(&mut self) {
        self.killed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockSandbox {
    files: Mutex<HashMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
    scripts: Mutex<HashMap<String, ScriptedProcess>>,
    spawns: Mutex<Vec<SpawnRecord>>,
    fail_mkdir: AtomicBool,
    fail_write: AtomicBool,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the process served for the next spawn of `command`.
    /// Commands without a script exit 0 immediately with no output.
    pub fn script(&self, command: &str) -> ScriptHandle {
        let (handle, process) = scripted();
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), process);
        handle
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.as_bytes().to_vec());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn dirs(&self) -> Vec<String> {
        self.dirs.lock().unwrap().iter().cloned().collect()
    }

    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.spawns.lock().unwrap().clone()
    }

    pub fn spawned_commands(&self) -> Vec<String> {
        self.spawns().iter().map(|s| s.command().to_string()).collect()
    }

    pub fn fail_mkdir(&self, fail: bool) {
        self.fail_mkdir.store(fail, Ordering::SeqCst);
    }

    pub fn fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self.files.lock().unwrap().get(path) {
            Some(bytes) => Ok(bytes.clone()),
            None => bail!("ENOENT: no such file {path}"),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            bail!("EACCES: cannot write {path}");
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        if self.fail_mkdir.load(Ordering::SeqCst) {
            bail!("EACCES: cannot create {path}");
        }
        let mut dirs = self.dirs.lock().unwrap();
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            dirs.insert(current.clone());
        }
        Ok(())
    }

    async fn spawn(
        &self,
        shell: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Box<dyn ProcessHandle>> {
        let record = SpawnRecord {
            shell: shell.to_string(),
            args: args.to_vec(),
            env: env.clone(),
        };
        let scripted_process = self.scripts.lock().unwrap().remove(record.command());
        self.spawns.lock().unwrap().push(record);

        let process = match scripted_process {
            Some(process) => process,
            None => {
                let (handle, process) = scripted();
                handle.exit(0);
                process
            }
        };
        Ok(Box::new(process))
    }
}
