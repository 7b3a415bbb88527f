//! # Configuration
//!
//! Loads and parses the runner's configuration file (`data/config.yaml` by convention).
//! Every section is optional and falls back to the defaults below.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to null, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    #[serde(default = "default_root")]
    pub root: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> String {
    ".".to_string()
}

/// How shell actions are spawned and interpreted.
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Arguments placed before the command line.
    #[serde(default = "default_shell_args")]
    pub shell_args: Vec<String>,
    #[serde(default = "default_env")]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub early_completion: EarlyCompletionConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_args: default_shell_args(),
            env: default_env(),
            confirmation: ConfirmationConfig::default(),
            early_completion: EarlyCompletionConfig::default(),
        }
    }
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_shell_args() -> Vec<String> {
    vec!["-c".to_string()]
}

fn default_env() -> HashMap<String, String> {
    // Suppresses npm's interactive "Ok to proceed?" prompts.
    HashMap::from([("npm_config_yes".to_string(), "true".to_string())])
}

/// What to do when a process asks a yes/no question.
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationPolicy {
    /// Answer every prompt affirmatively.
    #[default]
    Auto,
    /// Leave prompts unanswered.
    Never,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfirmationConfig {
    #[serde(default)]
    pub policy: ConfirmationPolicy,
    /// Lets the prompt finish rendering before answering.
    #[serde(default = "default_confirm_delay")]
    pub delay_ms: u64,
    #[serde(default = "default_confirm_response")]
    pub response: String,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            policy: ConfirmationPolicy::default(),
            delay_ms: default_confirm_delay(),
            response: default_confirm_response(),
        }
    }
}

fn default_confirm_delay() -> u64 {
    500
}

fn default_confirm_response() -> String {
    "y\n".to_string()
}

/// Whether a failure after early completion may replace the `complete` status.
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LateFailurePolicy {
    #[default]
    Downgrade,
    Keep,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EarlyCompletionConfig {
    /// Substrings that mark a command as a package-manager "run" invocation.
    #[serde(default = "default_run_markers")]
    pub run_markers: Vec<String>,
    #[serde(default = "default_success_phrases")]
    pub success_phrases: Vec<String>,
    #[serde(default)]
    pub late_failure: LateFailurePolicy,
}

impl Default for EarlyCompletionConfig {
    fn default() -> Self {
        Self {
            run_markers: default_run_markers(),
            success_phrases: default_success_phrases(),
            late_failure: LateFailurePolicy::default(),
        }
    }
}

fn default_run_markers() -> Vec<String> {
    vec!["npm run".into(), "yarn run".into(), "pnpm run".into()]
}

fn default_success_phrases() -> Vec<String> {
    vec!["Compiled successfully".into(), "Build completed".into()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
