//! # Action Runner
//!
//! Entry point for the parser and the UI. Registers actions, dispatches them
//! into the sequential executor and exposes the store for observers.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::executor::{JobHandler, SequentialExecutor};
use crate::application::file_action::FileActionRunner;
use crate::application::output::SharedSink;
use crate::application::shell_action::ShellActionRunner;
use crate::application::store::{ActionStore, StoreEvent};
use crate::domain::config::RunnerConfig;
use crate::domain::traits::{OutputSink, Sandbox};
use crate::domain::types::{ActionPatch, ActionRecord, ActionStatus};
use crate::patterns::{DefaultClassifier, OutputClassifier};

/// Executes one dequeued action.
struct ActionDispatcher {
    store: Arc<ActionStore>,
    files: FileActionRunner,
    shell: ShellActionRunner,
}

#[async_trait]
impl JobHandler for ActionDispatcher {
    async fn run(&self, id: &str) -> Result<()> {
        let Some(action) = self.store.get(id) else {
            bail!("Action {id} not found");
        };

        if action.cancel.is_cancelled() {
            tracing::info!("Action {} aborted before it started", id);
            self.store.update(id, ActionPatch::status(ActionStatus::Aborted));
            return Ok(());
        }

        tracing::info!("Running {} action {}: {}", action.record.kind(), id, action.record.label());
        self.store.update(id, ActionPatch::status(ActionStatus::Running));

        match &action.record {
            ActionRecord::File { file_path, content } => {
                let written = self.files.run(file_path, content, &action.cancel).await;
                let status = if written {
                    ActionStatus::Complete
                } else {
                    ActionStatus::Aborted
                };
                self.store.update(id, ActionPatch::status(status));
            }
            ActionRecord::Shell { content } => {
                if let Err(e) = self.shell.run(id, content, &action.cancel).await {
                    if action.cancel.is_cancelled() {
                        tracing::debug!("Ignoring error of aborted action {}: {:#}", id, e);
                        self.store.update(id, ActionPatch::status(ActionStatus::Aborted));
                        return Ok(());
                    }
                    self.store.update(id, ActionPatch::failed(format!("{e:#}")));
                    return Err(e);
                }
            }
        }

        // The shell runner settles its own status; this covers anything it left open.
        if let Some(state) = self.store.get(id)
            && !state.is_settled()
        {
            let status = if action.cancel.is_cancelled() {
                ActionStatus::Aborted
            } else {
                ActionStatus::Complete
            };
            self.store.update(id, ActionPatch::status(status));
        }
        Ok(())
    }

    fn recover(&self, id: &str, reason: &str) {
        let Some(state) = self.store.get(id) else {
            return;
        };
        if state.is_settled() {
            return;
        }
        if state.status == ActionStatus::Pending {
            self.store.update(id, ActionPatch::status(ActionStatus::Running));
        }
        tracing::warn!("Settling action {} as failed: {}", id, reason);
        self.store.update(id, ActionPatch::failed(reason));
    }
}

pub struct ActionRunner {
    store: Arc<ActionStore>,
    sandbox: Arc<dyn Sandbox>,
    sink: SharedSink,
    executor: SequentialExecutor,
}

impl ActionRunner {
    /// Creates a runner with the default output classifier.
    /// Must be called inside a tokio runtime: the executor worker is spawned here.
    pub fn new(sandbox: Arc<dyn Sandbox>, config: RunnerConfig) -> Self {
        let classifier = Arc::new(DefaultClassifier::new(&config.early_completion));
        Self::with_classifier(sandbox, config, classifier)
    }

    pub fn with_classifier(
        sandbox: Arc<dyn Sandbox>,
        config: RunnerConfig,
        classifier: Arc<dyn OutputClassifier>,
    ) -> Self {
        let store = Arc::new(ActionStore::new());
        let sink = SharedSink::new();

        let dispatcher = ActionDispatcher {
            store: store.clone(),
            files: FileActionRunner::new(sandbox.clone()),
            shell: ShellActionRunner::new(
                store.clone(),
                sandbox.clone(),
                sink.clone(),
                classifier,
                config,
            ),
        };

        Self {
            store,
            sandbox,
            sink,
            executor: SequentialExecutor::spawn(Arc::new(dispatcher)),
        }
    }

    /// Attaches (or replaces) the terminal that receives process output.
    pub fn set_output_sink(&self, sink: Arc<dyn OutputSink>) {
        self.sink.set(sink);
    }

    pub fn store(&self) -> &Arc<ActionStore> {
        &self.store
    }

    /// Live state changes. See [`ActionStore::subscribe`] for lag handling.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Registers a pending action. Returns `false` if the id was already known.
    pub fn add_action(&self, id: &str, record: ActionRecord) -> bool {
        self.store.register(id, record)
    }

    /// Commits the parser's final record and queues the action.
    /// Does nothing if the action was already dispatched.
    pub async fn run_action(&self, id: &str, record: ActionRecord) -> Result<()> {
        let Some(action) = self.store.get(id) else {
            bail!("Action {id} not found");
        };
        if action.executed {
            return Ok(());
        }

        let update = match &record {
            ActionRecord::File { file_path, .. } => {
                Some(self.sandbox.read_file(file_path).await.is_ok())
            }
            ActionRecord::Shell { .. } => None,
        };

        if !self.store.commit_dispatch(id, record, update) {
            return Ok(());
        }
        tracing::debug!("Queued action {}", id);
        self.executor.submit(id)
    }

    /// Requests cancellation. Returns `false` for unknown or already settled actions.
    pub fn cancel(&self, id: &str) -> bool {
        match self.store.get(id) {
            Some(state) if !state.is_settled() => {
                tracing::info!("Abort requested for action {}", id);
                state.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancels every action that has not settled yet. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        self.store
            .snapshot()
            .iter()
            .filter(|s| !s.is_settled())
            .map(|s| s.cancel.cancel())
            .count()
    }

    /// Waits until every action dispatched so far has been executed.
    pub async fn drain(&self) -> Result<()> {
        self.executor.drain().await
    }
}
