use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::JiraConfig;

/// One issue returned by the bounded bootstrap search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundIssue {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
}

/// One user returned by the assignable-user query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignableUser {
    pub name: String,
    pub display_name: String,
}

/// Seam over the issue-tracker REST surface so the import flow can be
/// exercised against a scripted backend in tests.
pub trait JiraApi {
    fn search_issues(&mut self, jql: &str, max_results: usize) -> Result<Vec<FoundIssue>>;
    fn assignable_users(&mut self, project: &str) -> Result<Vec<AssignableUser>>;
    /// Creates an issue from a `fields` document and returns the assigned key.
    fn create_issue(&mut self, fields: Value) -> Result<String>;
    fn delete_issue(&mut self, issue_key: &str, delete_subtasks: bool) -> Result<()>;
    /// Raw createmeta payload, used to confirm issue-type labels and custom
    /// field ids against the concrete instance.
    fn field_schema(&mut self) -> Result<Value>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct JiraClientConfig {
    pub base_url: String,
    pub token: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl JiraClientConfig {
    pub fn from_config(config: &JiraConfig) -> Result<Self> {
        let base_url = config.base_url().ok_or_else(|| {
            anyhow::anyhow!("Jira base URL is not configured (set JIRA_URL or [jira].url)")
        })?;
        let token = match env::var("JIRA_TOKEN") {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => bail!("JIRA_TOKEN is not set (a personal access token is required)"),
        };
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            user_agent: config.user_agent(),
            timeout_ms: config.timeout_ms(),
        })
    }
}

pub struct JiraClient {
    client: Client,
    config: JiraClientConfig,
    request_count: usize,
}

impl JiraClient {
    pub fn from_config(config: &JiraConfig) -> Result<Self> {
        Self::new(JiraClientConfig::from_config(config)?)
    }

    pub fn new(config: JiraClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Jira HTTP client")?;
        Ok(Self {
            client,
            config,
            request_count: 0,
        })
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.config.base_url)
    }

    fn get_json(&mut self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.request_count += 1;
        let url = self.rest_url(path);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("User-Agent", self.config.user_agent.clone())
            .query(query)
            .send()
            .with_context(|| format!("failed to call {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GET {path} failed with HTTP {status}");
        }
        response
            .json()
            .with_context(|| format!("failed to decode JSON response from {path}"))
    }

    fn post_json(&mut self, path: &str, body: &Value) -> Result<(reqwest::StatusCode, Value)> {
        self.request_count += 1;
        let url = self.rest_url(path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("User-Agent", self.config.user_agent.clone())
            .json(body)
            .send()
            .with_context(|| format!("failed to call {url}"))?;
        let status = response.status();
        let payload = response
            .json()
            .with_context(|| format!("failed to decode JSON response from {path}"))?;
        Ok((status, payload))
    }
}

impl JiraApi for JiraClient {
    fn search_issues(&mut self, jql: &str, max_results: usize) -> Result<Vec<FoundIssue>> {
        let body = serde_json::json!({
            "jql": jql,
            "maxResults": max_results,
            "fields": ["summary", "issuetype"],
        });
        let (status, payload) = self.post_json("search", &body)?;
        if !status.is_success() {
            bail!(
                "issue search failed with HTTP {status}: {}",
                error_summary(&payload)
            );
        }
        // A payload without `issues` means the dedup cache would start empty
        // and every run would re-create everything, so decoding is strict.
        let parsed: SearchResponse =
            serde_json::from_value(payload).context("failed to decode issue search response")?;
        Ok(parsed
            .issues
            .into_iter()
            .map(|issue| FoundIssue {
                key: issue.key,
                summary: issue.fields.summary,
                issue_type: issue.fields.issuetype.name,
            })
            .collect())
    }

    fn assignable_users(&mut self, project: &str) -> Result<Vec<AssignableUser>> {
        let payload = self.get_json(
            "user/assignable/search",
            &[("project", project.to_string())],
        )?;
        let parsed: Vec<UserPayload> =
            serde_json::from_value(payload).context("failed to decode assignable user response")?;
        Ok(parsed
            .into_iter()
            .map(|user| AssignableUser {
                name: user.name,
                display_name: user.display_name,
            })
            .collect())
    }

    fn create_issue(&mut self, fields: Value) -> Result<String> {
        let body = serde_json::json!({ "fields": fields });
        let (status, payload) = self.post_json("issue", &body)?;
        if !status.is_success() {
            bail!(
                "issue creation failed with HTTP {status}: {}",
                error_summary(&payload)
            );
        }
        match payload.get("key").and_then(Value::as_str) {
            Some(key) if !key.trim().is_empty() => Ok(key.to_string()),
            _ => bail!(
                "issue creation response carries no key: {}",
                error_summary(&payload)
            ),
        }
    }

    fn delete_issue(&mut self, issue_key: &str, delete_subtasks: bool) -> Result<()> {
        self.request_count += 1;
        let url = self.rest_url(&format!("issue/{issue_key}"));
        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("User-Agent", self.config.user_agent.clone())
            .query(&[("deleteSubtasks", delete_subtasks.to_string())])
            .send()
            .with_context(|| format!("failed to call {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            bail!("deleting {issue_key} failed with HTTP {status}: {detail}");
        }
        Ok(())
    }

    fn field_schema(&mut self) -> Result<Value> {
        self.get_json("issue/createmeta", &[])
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Flatten a Jira error body (`errorMessages` array plus `errors` map) into a
/// single line for failure messages.
pub fn error_summary(payload: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(messages) = payload.get("errorMessages").and_then(Value::as_array) {
        for message in messages {
            if let Some(text) = message.as_str() {
                parts.push(text.to_string());
            }
        }
    }
    if let Some(errors) = payload.get("errors").and_then(Value::as_object) {
        for (field, message) in errors {
            let text = message.as_str().unwrap_or("invalid value");
            parts.push(format!("{field}: {text}"));
        }
    }
    if parts.is_empty() {
        return payload.to_string();
    }
    parts.join("; ")
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    fields: SearchFields,
}

#[derive(Debug, Deserialize)]
struct SearchFields {
    summary: String,
    issuetype: IssueTypeField,
}

#[derive(Debug, Deserialize)]
struct IssueTypeField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    name: String,
    #[serde(rename = "displayName")]
    display_name: String,
}
