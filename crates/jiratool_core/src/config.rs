use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "jiratool/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_EPIC_TYPE: &str = "Epic";
pub const DEFAULT_TASK_TYPE: &str = "Task";
pub const DEFAULT_SUBTASK_TYPE: &str = "Sub-task";

// Custom field ids differ per instance; confirm with `jiratool fields`.
pub const DEFAULT_EPIC_NAME_FIELD: &str = "customfield_10103";
pub const DEFAULT_EPIC_LINK_FIELD: &str = "customfield_10101";
pub const DEFAULT_COST_FIELD: &str = "customfield_10400";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct JiraConfig {
    #[serde(default)]
    pub jira: JiraSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct JiraSection {
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub epic_type: Option<String>,
    pub task_type: Option<String>,
    pub subtask_type: Option<String>,
    pub epic_name_field: Option<String>,
    pub epic_link_field: Option<String>,
    pub cost_field: Option<String>,
}

impl JiraConfig {
    /// Resolve the backend base URL: env JIRA_URL > config > None.
    pub fn base_url(&self) -> Option<String> {
        if let Ok(value) = env::var("JIRA_URL") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
        self.jira.url.clone()
    }

    /// Resolve user agent: env JIRA_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        if let Ok(value) = env::var("JIRA_USER_AGENT") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.jira
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve HTTP timeout: env JIRA_HTTP_TIMEOUT_MS > DEFAULT_TIMEOUT_MS.
    pub fn timeout_ms(&self) -> u64 {
        env::var("JIRA_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn epic_type(&self) -> &str {
        self.jira.epic_type.as_deref().unwrap_or(DEFAULT_EPIC_TYPE)
    }

    pub fn task_type(&self) -> &str {
        self.jira.task_type.as_deref().unwrap_or(DEFAULT_TASK_TYPE)
    }

    pub fn subtask_type(&self) -> &str {
        self.jira
            .subtask_type
            .as_deref()
            .unwrap_or(DEFAULT_SUBTASK_TYPE)
    }

    pub fn epic_name_field(&self) -> &str {
        self.jira
            .epic_name_field
            .as_deref()
            .unwrap_or(DEFAULT_EPIC_NAME_FIELD)
    }

    pub fn epic_link_field(&self) -> &str {
        self.jira
            .epic_link_field
            .as_deref()
            .unwrap_or(DEFAULT_EPIC_LINK_FIELD)
    }

    pub fn cost_field(&self) -> &str {
        self.jira.cost_field.as_deref().unwrap_or(DEFAULT_COST_FIELD)
    }
}

/// Load and parse a JiraConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<JiraConfig> {
    if !config_path.exists() {
        return Ok(JiraConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: JiraConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
