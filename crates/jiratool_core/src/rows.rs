use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};

pub const DEFAULT_SKIP_LINES: usize = 1;
const EXPECTED_COLUMNS: usize = 6;

/// One resolved CSV record after sparse-fill. Columns: epic, task, subtask,
/// cost in hours, assignee, priority.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRow {
    pub epic: String,
    pub task: String,
    /// Blank subtask cells copy the current task title: the row then stands
    /// for the parent task itself.
    pub subtask: String,
    pub cost_hours: f64,
    pub assignee: String,
    pub priority: String,
}

pub fn read_work_rows_from_path(path: &Path, skip_lines: usize) -> Result<Vec<WorkRow>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_work_rows(file, skip_lines)
}

/// Read the work breakdown from a tabular stream, skipping `skip_lines` header
/// rows. Blank epic/task cells inherit the previous row's value (merged-cell
/// convention); malformed rows fail the run with their line number.
pub fn read_work_rows<R: Read>(reader: R, skip_lines: usize) -> Result<Vec<WorkRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut epic = String::new();
    let mut task = String::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record =
            record.with_context(|| format!("failed to read CSV record {}", index + 1))?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 1);
        if index < skip_lines {
            continue;
        }
        if record.len() < EXPECTED_COLUMNS {
            bail!(
                "line {line}: expected {EXPECTED_COLUMNS} columns (epic, task, subtask, cost, assignee, priority), found {}",
                record.len()
            );
        }

        let cell = |column: usize| record.get(column).unwrap_or("").trim().to_string();

        let epic_cell = cell(0);
        if !epic_cell.is_empty() {
            epic = epic_cell;
        }
        let task_cell = cell(1);
        if !task_cell.is_empty() {
            task = task_cell;
        }
        if epic.is_empty() {
            bail!("line {line}: epic column is blank and no previous row names one");
        }
        if task.is_empty() {
            bail!("line {line}: task column is blank and no previous row names one");
        }

        let subtask_cell = cell(2);
        let subtask = if subtask_cell.is_empty() {
            task.clone()
        } else {
            subtask_cell
        };

        let cost_hours =
            parse_cost_hours(&cell(3)).with_context(|| format!("line {line}: invalid cost"))?;

        rows.push(WorkRow {
            epic: epic.clone(),
            task: task.clone(),
            subtask,
            cost_hours,
            assignee: cell(4),
            priority: cell(5),
        });
    }
    Ok(rows)
}

/// Blank cost means zero hours; anything else must be a non-negative number.
/// Silent coercion of garbage to zero would mask data errors.
fn parse_cost_hours(cell: &str) -> Result<f64> {
    if cell.is_empty() {
        return Ok(0.0);
    }
    let value = cell
        .parse::<f64>()
        .map_err(|_| anyhow::anyhow!("non-numeric cost value: {cell:?}"))?;
    if !value.is_finite() || value < 0.0 {
        bail!("cost must be a non-negative number, got {cell:?}");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SKIP_LINES, read_work_rows};

    fn rows(input: &str) -> Vec<super::WorkRow> {
        read_work_rows(input.as_bytes(), DEFAULT_SKIP_LINES).expect("read rows")
    }

    const HEADER: &str = "epic,task,subtask,cost,assignee,priority\n";

    #[test]
    fn blank_epic_and_task_inherit_previous_row() {
        let input = format!("{HEADER}E1,T1,,2,A,High\n,,S2,3,B,Low\n");
        let parsed = rows(&input);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].epic, "E1");
        assert_eq!(parsed[1].task, "T1");
        assert_eq!(parsed[1].subtask, "S2");
    }

    #[test]
    fn blank_subtask_copies_current_task() {
        let input = format!("{HEADER}E1,T1,,2,A,High\n");
        let parsed = rows(&input);
        assert_eq!(parsed[0].subtask, "T1");
        assert_eq!(parsed[0].cost_hours, 2.0);
        assert_eq!(parsed[0].assignee, "A");
        assert_eq!(parsed[0].priority, "High");
    }

    #[test]
    fn subtask_follows_task_change_not_stale_value() {
        let input = format!("{HEADER}E1,T1,S1,1,A,High\n,T2,,1,A,High\n");
        let parsed = rows(&input);
        assert_eq!(parsed[1].task, "T2");
        assert_eq!(parsed[1].subtask, "T2");
    }

    #[test]
    fn blank_cost_defaults_to_zero() {
        let input = format!("{HEADER}E1,T1,S1,,A,High\n");
        assert_eq!(rows(&input)[0].cost_hours, 0.0);
    }

    #[test]
    fn non_numeric_cost_fails_with_line_number() {
        let input = format!("{HEADER}E1,T1,S1,two,A,High\n");
        let error = read_work_rows(input.as_bytes(), DEFAULT_SKIP_LINES).expect_err("must fail");
        let message = format!("{error:#}");
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("non-numeric cost"), "{message}");
    }

    #[test]
    fn short_row_fails_with_line_number() {
        let input = format!("{HEADER}E1,T1,S1\n");
        let error = read_work_rows(input.as_bytes(), DEFAULT_SKIP_LINES).expect_err("must fail");
        assert!(error.to_string().contains("line 2"), "{error}");
        assert!(error.to_string().contains("expected 6 columns"), "{error}");
    }

    #[test]
    fn blank_leading_epic_fails() {
        let input = format!("{HEADER},T1,S1,1,A,High\n");
        let error = read_work_rows(input.as_bytes(), DEFAULT_SKIP_LINES).expect_err("must fail");
        assert!(error.to_string().contains("epic column is blank"), "{error}");
    }

    #[test]
    fn skip_lines_drops_leading_rows() {
        let input = "junk line one,,,,,\njunk line two,,,,,\nE1,T1,S1,1,A,High\n";
        let parsed = read_work_rows(input.as_bytes(), 2).expect("read rows");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].epic, "E1");
    }

    #[test]
    fn cells_are_trimmed() {
        let input = format!("{HEADER} E1 , T1 , S1 , 2 , A , High \n");
        let parsed = rows(&input);
        assert_eq!(parsed[0].epic, "E1");
        assert_eq!(parsed[0].subtask, "S1");
        assert_eq!(parsed[0].cost_hours, 2.0);
        assert_eq!(parsed[0].priority, "High");
    }
}
