//! # Domain Types
//!
//! Action records produced by the parser, their lifecycle status, and the
//! per-action state kept in the store.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// One declared unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionRecord {
    File { file_path: String, content: String },
    Shell { content: String },
}

impl ActionRecord {
    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::File {
            file_path: path.into(),
            content: content.into(),
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell {
            content: command.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Shell { .. } => "shell",
        }
    }

    /// Short human label (path or command line).
    pub fn label(&self) -> &str {
        match self {
            Self::File { file_path, .. } => file_path,
            Self::Shell { content } => content,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Running,
    Complete,
    Aborted,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a registered action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionState {
    pub id: String,
    #[serde(flatten)]
    pub record: ActionRecord,
    pub status: ActionStatus,
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// File actions only: the target already existed when the action was dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<bool>,
    /// `Complete` was reported from output heuristics while the process is still alive.
    pub provisional: bool,
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl ActionState {
    pub fn new(id: impl Into<String>, record: ActionRecord) -> Self {
        Self {
            id: id.into(),
            record,
            status: ActionStatus::Pending,
            executed: false,
            error: None,
            update: None,
            provisional: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Terminal and no longer open to late resolution.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() && !self.provisional
    }

    /// Whether the lifecycle allows moving from the current status to `next`.
    ///
    /// A provisional `Complete` is still open: the owning process may later
    /// settle it as complete, failed or aborted.
    pub fn can_transition(&self, next: ActionStatus) -> bool {
        use ActionStatus::*;

        match self.status {
            Pending => matches!(next, Running | Aborted),
            Running => matches!(next, Running | Complete | Failed | Aborted),
            Complete if self.provisional => matches!(next, Complete | Failed | Aborted),
            Complete | Aborted | Failed => false,
        }
    }
}

/// Partial update merged into an [`ActionState`].
#[derive(Debug, Clone, Default)]
pub struct ActionPatch {
    pub record: Option<ActionRecord>,
    pub status: Option<ActionStatus>,
    pub executed: Option<bool>,
    pub error: Option<String>,
    pub update: Option<bool>,
    pub provisional: Option<bool>,
}

impl ActionPatch {
    pub fn status(status: ActionStatus) -> Self {
        Self {
            status: Some(status),
            provisional: Some(false),
            ..Default::default()
        }
    }

    /// Early completion reported while the process keeps running.
    pub fn provisional_complete() -> Self {
        Self {
            status: Some(ActionStatus::Complete),
            provisional: Some(true),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ActionStatus::Failed),
            error: Some(error.into()),
            provisional: Some(false),
            ..Default::default()
        }
    }
}
