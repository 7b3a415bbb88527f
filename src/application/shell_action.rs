//! # Shell Action Runner
//!
//! Spawns one command line in the sandbox shell and shepherds it to a final status:
//! - streams every output chunk to the sink
//! - collects error text for the final verdict
//! - answers yes/no prompts according to the confirmation policy
//! - reports package-manager `run` commands complete once a dev server is up
//! - kills the process when the action is cancelled

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::output::SharedSink;
use crate::application::store::ActionStore;
use crate::domain::config::{ConfirmationPolicy, LateFailurePolicy, RunnerConfig};
use crate::domain::traits::{ProcessEvent, ProcessHandle, Sandbox};
use crate::domain::types::{ActionPatch, ActionStatus};
use crate::patterns::OutputClassifier;
use crate::strings::messages;

/// How long output is still read after the shell itself has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(200);

pub struct ShellActionRunner {
    store: Arc<ActionStore>,
    sandbox: Arc<dyn Sandbox>,
    sink: SharedSink,
    classifier: Arc<dyn OutputClassifier>,
    config: RunnerConfig,
}

/// Per-run bookkeeping.
#[derive(Default)]
struct Progress {
    errors: String,
    confirmed: bool,
    early_completed: bool,
}

impl ShellActionRunner {
    pub fn new(
        store: Arc<ActionStore>,
        sandbox: Arc<dyn Sandbox>,
        sink: SharedSink,
        classifier: Arc<dyn OutputClassifier>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            sandbox,
            sink,
            classifier,
            config,
        }
    }

    /// Runs `command` for action `id` and writes its final status.
    pub async fn run(&self, id: &str, command: &str, cancel: &CancellationToken) -> Result<()> {
        let mut args = self.config.shell_args.clone();
        args.push(command.to_string());

        let mut process = self
            .sandbox
            .spawn(&self.config.shell, &args, &self.config.env)
            .await
            .with_context(|| format!("Failed to spawn `{command}`"))?;

        let run_command = self.classifier.is_run_command(command);
        let mut progress = Progress::default();

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    process.kill();
                    break process.wait().await;
                }
                event = process.next_event() => match event {
                    Ok(ProcessEvent::Output(chunk)) => {
                        self.on_chunk(id, &chunk, run_command, process.as_mut(), cancel, &mut progress)
                            .await;
                    }
                    Ok(ProcessEvent::Exited(code)) => {
                        self.drain_output(id, run_command, process.as_mut(), cancel, &mut progress)
                            .await;
                        break Ok(code);
                    }
                    Err(e) => break Err(e),
                },
            }
        };
        // A killed process may not report a code; the status is aborted either way.
        let exit_code = match exit {
            Ok(code) => code,
            Err(_) if cancel.is_cancelled() => -1,
            Err(e) => return Err(e.context(format!("Failed to wait for `{command}`"))),
        };
        tracing::debug!("Process terminated with code {} | {}", exit_code, command);

        self.resolve(id, exit_code, cancel, progress);
        Ok(())
    }

    /// Picks up output the shell wrote just before exiting. Background children
    /// may keep the pipe open, so reading stops at `OUTPUT_GRACE` after the exit.
    async fn drain_output(
        &self,
        id: &str,
        run_command: bool,
        process: &mut dyn ProcessHandle,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) {
        let deadline = Instant::now() + OUTPUT_GRACE;
        while let Ok(Some(chunk)) = tokio::time::timeout_at(deadline, process.next_output()).await {
            self.on_chunk(id, &chunk, run_command, process, cancel, progress).await;
        }
    }

    async fn on_chunk(
        &self,
        id: &str,
        chunk: &str,
        run_command: bool,
        process: &mut dyn ProcessHandle,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) {
        self.sink.write(chunk);
        let signals = self.classifier.classify(chunk, run_command);

        if signals.error {
            progress.errors.push_str(chunk);
        }

        if signals.confirmation {
            self.confirm(id, process, cancel, progress).await;
        }

        if signals.early_completion() && !progress.early_completed {
            progress.early_completed = true;
            self.store.update(id, ActionPatch::provisional_complete());
            match signals.port {
                Some(port) => tracing::debug!("Application detected running on port {}", port),
                None => tracing::debug!("Application build completed successfully"),
            }
        }
    }

    async fn confirm(
        &self,
        id: &str,
        process: &mut dyn ProcessHandle,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) {
        let confirmation = &self.config.confirmation;
        if confirmation.policy == ConfirmationPolicy::Never {
            tracing::info!("Action {} is waiting for confirmation; auto-confirm disabled", id);
            return;
        }

        // Let the prompt finish rendering before answering.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(confirmation.delay_ms)) => {}
        }

        if let Err(e) = process.write_input(&confirmation.response).await {
            tracing::warn!("Failed to answer prompt for action {}: {:#}", id, e);
            return;
        }
        progress.confirmed = true;
        self.sink.write(&messages::automatic_response(&confirmation.response));
    }

    fn resolve(&self, id: &str, exit_code: i32, cancel: &CancellationToken, progress: Progress) {
        if cancel.is_cancelled() {
            self.store.update(id, ActionPatch::status(ActionStatus::Aborted));
            return;
        }

        if exit_code != 0 || !progress.errors.is_empty() {
            let message = if progress.errors.is_empty() {
                messages::non_zero_exit(exit_code)
            } else {
                progress.errors
            };
            tracing::error!("Shell action error: {}", message);

            let late_policy = self.config.early_completion.late_failure;
            if progress.early_completed && late_policy == LateFailurePolicy::Keep {
                tracing::warn!("Keeping early completion of action {} despite late failure", id);
                self.store.update(id, ActionPatch::status(ActionStatus::Complete));
            } else {
                self.store.update(id, ActionPatch::failed(message.clone()));
            }
            self.sink.write(&messages::error_block(&message));
        } else {
            self.store.update(id, ActionPatch::status(ActionStatus::Complete));
        }

        if progress.confirmed {
            self.sink.write(messages::CONFIRMATION_NOTE);
        }
    }
}
