use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::variables::StaticContext;

const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Per-project settings read from `.arbor/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// tracing filter directive, e.g. "arbor=debug"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl Config {
    /// Load the config of a project, falling back to defaults when the file is absent.
    pub fn load(arbor_dir: &Path) -> Result<Self> {
        let path = arbor_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn save(&self, arbor_dir: &Path) -> Result<()> {
        fs::write(arbor_dir.join(CONFIG_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Apply `ARBOR_USER` / `ARBOR_EMAIL`.
    pub fn with_env(self) -> Self {
        self.with_overrides(env::var("ARBOR_USER").ok(), env::var("ARBOR_EMAIL").ok())
    }

    pub fn with_overrides(mut self, user_name: Option<String>, user_email: Option<String>) -> Self {
        if let Some(name) = user_name.filter(|s| !s.trim().is_empty()) {
            self.user_name = Some(name);
        }
        if let Some(email) = user_email.filter(|s| !s.trim().is_empty()) {
            self.user_email = Some(email);
        }
        self
    }

    /// The person creating nodes: configured name, else the git author.
    pub fn acting_user(&self) -> Option<String> {
        self.user_name.clone().or_else(get_git_author)
    }

    pub fn static_context(&self) -> StaticContext {
        StaticContext::new(self.acting_user(), self.user_email.clone())
    }

    /// Filter for the log subscriber; `ARBOR_LOG` wins over the file.
    pub fn log_filter(&self) -> String {
        env::var("ARBOR_LOG")
            .ok()
            .or_else(|| self.log_filter.clone())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}

/// Find the project root by looking for .arbor/ or .git/
pub fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(".arbor").exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

fn get_git_author() -> Option<String> {
    std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            } else {
                None
            }
        })
}
