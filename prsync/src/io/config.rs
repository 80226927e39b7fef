//! Sync configuration: optional TOML file overlaid with environment variables.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::{github, todoist};

pub const DEFAULT_CONFIG_PATH: &str = "prsync.toml";

pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_TODOIST_TOKEN: &str = "TODOIST_API_TOKEN";
pub const ENV_TODOIST_PROJECT: &str = "TODOIST_PROJECT_ID";
pub const ENV_TODOIST_SECTION: &str = "TODOIST_SECTION_ID";
pub const ENV_REQUEST_DELAY: &str = "PRSYNC_REQUEST_DELAY";
pub const ENV_STATE_PATH: &str = "PRSYNC_STATE_PATH";

/// Upper bound for `request_delay_secs`.
pub const MAX_REQUEST_DELAY_SECS: f64 = 60.0;

/// Sync configuration (TOML). Missing fields take defaults.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub github_token: Option<String>,
    pub todoist_token: Option<String>,
    /// Destination project for created tasks (inbox when unset).
    pub todoist_project_id: Option<String>,
    pub todoist_section_id: Option<String>,
    /// Pause before every outbound request after the first, in seconds.
    pub request_delay_secs: f64,
    pub request_timeout_secs: u64,
    pub state_path: PathBuf,
    /// Natural-language due date attached to new tasks.
    pub due_string: Option<String>,
    pub github_api_base: String,
    pub todoist_api_base: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            todoist_token: None,
            todoist_project_id: None,
            todoist_section_id: None,
            request_delay_secs: 0.5,
            request_timeout_secs: 30,
            state_path: PathBuf::from(".prsync/state.json"),
            due_string: Some("today".to_string()),
            github_api_base: github::DEFAULT_API_BASE.to_string(),
            todoist_api_base: todoist::DEFAULT_API_BASE.to_string(),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "<redacted>");
        f.debug_struct("SyncConfig")
            .field("github_token", &redact(&self.github_token))
            .field("todoist_token", &redact(&self.todoist_token))
            .field("todoist_project_id", &self.todoist_project_id)
            .field("todoist_section_id", &self.todoist_section_id)
            .field("request_delay_secs", &self.request_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("state_path", &self.state_path)
            .field("due_string", &self.due_string)
            .field("github_api_base", &self.github_api_base)
            .field("todoist_api_base", &self.todoist_api_base)
            .finish()
    }
}

/// Both credentials, present and non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub github_token: String,
    pub todoist_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &"<redacted>")
            .field("todoist_token", &"<redacted>")
            .finish()
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_REQUEST_DELAY_SECS).contains(&self.request_delay_secs) {
            return Err(anyhow!(
                "request_delay_secs must be between 0 and {MAX_REQUEST_DELAY_SECS}"
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.state_path.as_os_str().is_empty() {
            return Err(anyhow!("state_path must not be empty"));
        }
        Ok(())
    }

    /// Credentials required by `sync`. Errors name every missing variable.
    pub fn credentials(&self) -> Result<Credentials> {
        let github = non_empty(self.github_token.as_deref());
        let todoist = non_empty(self.todoist_token.as_deref());
        match (github, todoist) {
            (Some(github_token), Some(todoist_token)) => Ok(Credentials {
                github_token: github_token.to_string(),
                todoist_token: todoist_token.to_string(),
            }),
            (github, todoist) => {
                let mut missing = Vec::new();
                if github.is_none() {
                    missing.push(ENV_GITHUB_TOKEN);
                }
                if todoist.is_none() {
                    missing.push(ENV_TODOIST_TOKEN);
                }
                Err(anyhow!("missing credentials: {}", missing.join(", ")))
            }
        }
    }

    /// Pacing delay. Out-of-range values that skipped `validate` mean no delay.
    pub fn request_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_delay_secs).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Overlay environment variables on top of file values.
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = var(ENV_GITHUB_TOKEN) {
            self.github_token = Some(token);
        }
        if let Some(token) = var(ENV_TODOIST_TOKEN) {
            self.todoist_token = Some(token);
        }
        if let Some(project) = var(ENV_TODOIST_PROJECT) {
            self.todoist_project_id = Some(project);
        }
        if let Some(section) = var(ENV_TODOIST_SECTION) {
            self.todoist_section_id = Some(section);
        }
        if let Some(delay) = var(ENV_REQUEST_DELAY) {
            self.request_delay_secs = delay
                .trim()
                .parse()
                .with_context(|| format!("parse {ENV_REQUEST_DELAY}={delay}"))?;
        }
        if let Some(path) = var(ENV_STATE_PATH) {
            self.state_path = PathBuf::from(path);
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Load config from an optional TOML file, then apply environment overrides.
///
/// An explicit `path` must exist; without one, `prsync.toml` in the working
/// directory is used when present.
pub fn load_config<F>(path: Option<&Path>, env: F) -> Result<SyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                SyncConfig::default()
            }
        }
    };
    cfg.apply_env(env)?;
    cfg.validate()?;
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<SyncConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
