use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::api::JiraApi;

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub issue_key: String,
    pub deleted_subtasks: bool,
}

/// Delete the composite `{PROJECT}-{id}` issue together with its subtasks.
/// Cleanup utility for failed or test runs; not part of the import contract.
pub fn delete_issue_by_id(api: &mut impl JiraApi, project: &str, id: u64) -> Result<DeleteReport> {
    let project = project.trim();
    if project.is_empty() {
        bail!("delete requires a non-empty project key");
    }
    let issue_key = format!("{project}-{id}");
    api.delete_issue(&issue_key, true)
        .with_context(|| format!("failed to delete {issue_key}"))?;
    Ok(DeleteReport {
        issue_key,
        deleted_subtasks: true,
    })
}

/// Pretty-printed createmeta dump, for confirming issue-type labels and custom
/// field ids against the concrete backend instance.
pub fn render_field_schema(api: &mut impl JiraApi) -> Result<String> {
    let schema = api.field_schema()?;
    serde_json::to_string_pretty(&schema).context("failed to render field schema")
}
