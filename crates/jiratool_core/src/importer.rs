use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use crate::api::{AssignableUser, JiraApi};
use crate::config::JiraConfig;
use crate::rows::{WorkRow, read_work_rows_from_path};

pub const DEFAULT_PRIORITY: &str = "Medium";
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 1500;

/// The three levels of the imported hierarchy. Backend label strings are
/// instance configuration, not part of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueType {
    Epic,
    Task,
    Subtask,
}

/// Issue-type names as the backend instance spells them (they vary by locale
/// and configuration; confirm with `jiratool fields`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTypeLabels {
    pub epic: String,
    pub task: String,
    pub subtask: String,
}

impl Default for IssueTypeLabels {
    fn default() -> Self {
        Self {
            epic: crate::config::DEFAULT_EPIC_TYPE.to_string(),
            task: crate::config::DEFAULT_TASK_TYPE.to_string(),
            subtask: crate::config::DEFAULT_SUBTASK_TYPE.to_string(),
        }
    }
}

impl IssueTypeLabels {
    pub fn label(&self, issue_type: IssueType) -> &str {
        match issue_type {
            IssueType::Epic => &self.epic,
            IssueType::Task => &self.task,
            IssueType::Subtask => &self.subtask,
        }
    }

    /// Map a backend label back to a hierarchy level. Labels outside the
    /// configured trio return None and are ignored during cache population.
    pub fn from_label(&self, label: &str) -> Option<IssueType> {
        if label == self.epic {
            Some(IssueType::Epic)
        } else if label == self.task {
            Some(IssueType::Task)
        } else if label == self.subtask {
            Some(IssueType::Subtask)
        } else {
            None
        }
    }
}

/// Dedup cache mapping (issue type, summary) to the backend issue key.
/// Seeded from the bootstrap search, grows monotonically as issues are
/// created, never pruned within a run.
#[derive(Debug, Default)]
pub struct IssueKeyCache {
    entries: HashMap<(IssueType, String), String>,
}

impl IssueKeyCache {
    pub fn get(&self, issue_type: IssueType, summary: &str) -> Option<&str> {
        self.entries
            .get(&(issue_type, summary.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, issue_type: IssueType, summary: &str, key: String) {
        self.entries.insert((issue_type, summary.to_string()), key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bridge from CSV display names to backend login names, keyed by the
/// display name truncated at the first hyphen. Collisions keep the last
/// entry but are recorded so the report can surface them.
#[derive(Debug, Default)]
pub struct UserNameMap {
    entries: HashMap<String, String>,
    collisions: Vec<String>,
}

impl UserNameMap {
    pub fn from_users(users: &[AssignableUser]) -> Self {
        let mut map = Self::default();
        for user in users {
            let prefix = display_name_prefix(&user.display_name);
            if prefix.is_empty() {
                continue;
            }
            if let Some(previous) = map.entries.insert(prefix.clone(), user.name.clone())
                && previous != user.name
            {
                map.collisions.push(format!(
                    "display-name prefix {prefix:?} matches both {previous:?} and {:?}; keeping {:?}",
                    user.name, user.name
                ));
            }
        }
        map
    }

    /// Translate a CSV assignee value; unmapped values pass through unchanged.
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.entries.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn display_name_prefix(display_name: &str) -> String {
    display_name
        .split('-')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub project: String,
    pub version: String,
    pub labels: IssueTypeLabels,
    pub epic_name_field: String,
    pub epic_link_field: String,
    pub cost_field: String,
    pub default_priority: String,
    pub max_search_results: usize,
}

impl ImportOptions {
    pub fn new(project: &str, version: &str) -> Self {
        Self::from_config(&JiraConfig::default(), project, version)
    }

    pub fn from_config(config: &JiraConfig, project: &str, version: &str) -> Self {
        Self {
            project: project.trim().to_string(),
            version: version.trim().to_string(),
            labels: IssueTypeLabels {
                epic: config.epic_type().to_string(),
                task: config.task_type().to_string(),
                subtask: config.subtask_type().to_string(),
            },
            epic_name_field: config.epic_name_field().to_string(),
            epic_link_field: config.epic_link_field().to_string(),
            cost_field: config.cost_field().to_string(),
            default_priority: DEFAULT_PRIORITY.to_string(),
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ImportReport {
    pub rows: usize,
    pub epics_created: usize,
    pub epics_reused: usize,
    pub tasks_created: usize,
    pub tasks_reused: usize,
    pub subtasks_created: usize,
    pub subtasks_skipped: usize,
    pub created_keys: Vec<String>,
    pub warnings: Vec<String>,
    pub request_count: usize,
}

/// Sequential create-or-reuse walk over the CSV hierarchy. Owns the dedup
/// cache and the user map for one run; both are rebuilt from backend state at
/// bootstrap, which is what makes repeated runs idempotent.
pub struct Importer<'a, A: JiraApi> {
    api: &'a mut A,
    options: ImportOptions,
    cache: IssueKeyCache,
    users: UserNameMap,
}

impl<'a, A: JiraApi> Importer<'a, A> {
    /// Run the two read-only bootstrap queries and build the lookup tables.
    /// Decode failures propagate: continuing with an empty cache would cause
    /// duplicate creation, the exact bug the cache exists to prevent.
    pub fn bootstrap(api: &'a mut A, options: ImportOptions) -> Result<Self> {
        let jql = format!(
            "project = {} AND affectedVersion = {}",
            options.project, options.version
        );
        let existing = api
            .search_issues(&jql, options.max_search_results)
            .context("failed to search existing issues")?;
        let mut cache = IssueKeyCache::default();
        for issue in existing {
            if let Some(issue_type) = options.labels.from_label(&issue.issue_type) {
                cache.insert(issue_type, &issue.summary, issue.key);
            }
        }
        let users = api
            .assignable_users(&options.project)
            .context("failed to list assignable users")?;
        Ok(Self {
            api,
            options,
            cache,
            users: UserNameMap::from_users(&users),
        })
    }

    pub fn cached_issues(&self) -> usize {
        self.cache.len()
    }

    pub fn known_users(&self) -> usize {
        self.users.len()
    }

    pub fn import_csv_file(&mut self, path: &Path, skip_lines: usize) -> Result<ImportReport> {
        let rows = read_work_rows_from_path(path, skip_lines)?;
        self.import_rows(&rows)
    }

    pub fn import_rows(&mut self, rows: &[WorkRow]) -> Result<ImportReport> {
        let mut report = ImportReport {
            warnings: self.users.collisions().to_vec(),
            ..ImportReport::default()
        };
        for row in rows {
            report.rows += 1;
            let epic_key = self.ensure_epic(&row.epic, &mut report)?;
            let task_key = self.ensure_task(&epic_key, &row.task, &mut report)?;
            self.ensure_subtask(&task_key, row, &mut report)?;
        }
        report.request_count = self.api.request_count();
        Ok(report)
    }

    fn ensure_epic(&mut self, epic: &str, report: &mut ImportReport) -> Result<String> {
        if let Some(key) = self.cache.get(IssueType::Epic, epic) {
            report.epics_reused += 1;
            return Ok(key.to_string());
        }
        let key = self
            .api
            .create_issue(epic_fields(&self.options, epic))
            .with_context(|| format!("failed to create epic {epic:?}"))?;
        self.cache.insert(IssueType::Epic, epic, key.clone());
        report.epics_created += 1;
        report.created_keys.push(key.clone());
        Ok(key)
    }

    fn ensure_task(
        &mut self,
        epic_key: &str,
        task: &str,
        report: &mut ImportReport,
    ) -> Result<String> {
        if let Some(key) = self.cache.get(IssueType::Task, task) {
            report.tasks_reused += 1;
            return Ok(key.to_string());
        }
        let key = self
            .api
            .create_issue(task_fields(&self.options, epic_key, task))
            .with_context(|| format!("failed to create task {task:?}"))?;
        self.cache.insert(IssueType::Task, task, key.clone());
        report.tasks_created += 1;
        report.created_keys.push(key.clone());
        Ok(key)
    }

    fn ensure_subtask(
        &mut self,
        task_key: &str,
        row: &WorkRow,
        report: &mut ImportReport,
    ) -> Result<()> {
        // Existing subtasks are never updated in place: a re-run after editing
        // cost/assignee/priority leaves the backend issue untouched.
        if self.cache.get(IssueType::Subtask, &row.subtask).is_some() {
            report.subtasks_skipped += 1;
            return Ok(());
        }
        let assignee = self.users.resolve(&row.assignee).to_string();
        let key = self
            .api
            .create_issue(subtask_fields(&self.options, task_key, row, &assignee))
            .with_context(|| format!("failed to create subtask {:?}", row.subtask))?;
        self.cache.insert(IssueType::Subtask, &row.subtask, key.clone());
        report.subtasks_created += 1;
        report.created_keys.push(key);
        Ok(())
    }
}

pub fn epic_fields(options: &ImportOptions, epic: &str) -> Value {
    let mut fields = json!({
        "summary": epic,
        "description": epic,
        "project": {"key": options.project},
        "issuetype": {"name": options.labels.epic},
        "versions": [{"name": options.version}],
    });
    if let Some(map) = fields.as_object_mut() {
        map.insert(
            options.epic_name_field.clone(),
            Value::String(epic.to_string()),
        );
    }
    fields
}

pub fn task_fields(options: &ImportOptions, epic_key: &str, task: &str) -> Value {
    let mut fields = json!({
        "summary": task,
        "description": task,
        "project": {"key": options.project},
        "issuetype": {"name": options.labels.task},
        "versions": [{"name": options.version}],
    });
    if let Some(map) = fields.as_object_mut() {
        // The epic relation is a tagged reference field, not issue hierarchy.
        map.insert(
            options.epic_link_field.clone(),
            Value::String(epic_key.to_string()),
        );
    }
    fields
}

pub fn subtask_fields(
    options: &ImportOptions,
    task_key: &str,
    row: &WorkRow,
    assignee: &str,
) -> Value {
    let priority = if row.priority.is_empty() {
        options.default_priority.as_str()
    } else {
        row.priority.as_str()
    };
    let minutes = (row.cost_hours * 60.0).round() as i64;
    let mut fields = json!({
        "summary": row.subtask,
        "description": row.subtask,
        "project": {"key": options.project},
        "parent": {"key": task_key},
        "issuetype": {"name": options.labels.subtask},
        "priority": {"name": priority},
        "versions": [{"name": options.version}],
        "timetracking": {
            "originalEstimate": "0m",
            "remainingEstimate": "0m",
            "originalEstimateSeconds": 0,
            "remainingEstimateSeconds": 0,
        },
    });
    if let Some(map) = fields.as_object_mut() {
        map.insert(options.cost_field.clone(), Value::from(minutes));
        if !assignee.is_empty() {
            map.insert("assignee".to_string(), json!({"name": assignee}));
        }
    }
    fields
}
