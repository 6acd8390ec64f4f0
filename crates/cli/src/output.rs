use std::fmt;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::group::Groups;
use crate::core::model::{Employee, Post, Project, ProjectSummary, Task, Topic, Workload};
use crate::core::recycle::BinEntry;
use crate::core::{MutationOutcome, Notice, ViewSnapshot};

/// Plain text for people, JSON for scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Format::Json
        } else {
            Format::Text
        }
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

fn day(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub struct TaskLine<'a>(pub &'a Task);

impl fmt::Display for TaskLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.0;
        let mark = if task.status.is_completed() { 'x' } else { ' ' };
        write!(
            f,
            "[{mark}] {:<10} {:<32} {:<6} due {}",
            task.id,
            task.name,
            task.priority.label(),
            day(task.due_at)
        )?;
        if let Some(assignee) = &task.assigned_to {
            write!(f, "  -> {assignee}")?;
        }
        Ok(())
    }
}

pub struct ProjectLine<'a>(pub &'a Project);

impl fmt::Display for ProjectLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let project = self.0;
        write!(
            f,
            "{:<10} {:<32} {:<9} {:<6} deadline {}  {:>3}%",
            project.id,
            project.name,
            project.state().as_str(),
            project.priority.label(),
            day(project.deadline),
            project.progress
        )?;
        if let Some(leader) = &project.team_leader_id {
            write!(f, "  lead {leader}")?;
        }
        Ok(())
    }
}

fn footer<W: Write, T>(writer: &mut W, view: &ViewSnapshot<T>, noun: &str) -> Result<()> {
    writeln!(
        writer,
        "{} of {} {noun} shown, {} in bin",
        view.items.len(),
        view.total,
        view.binned
    )?;
    write_notice(writer, view.notice.as_ref())
}

/// Surface error notices only; info notices repeat what the command already printed.
pub fn write_notice<W: Write>(writer: &mut W, notice: Option<&Notice>) -> Result<()> {
    if let Some(notice) = notice.filter(|notice| notice.is_error()) {
        writeln!(writer, "warning: {}", notice.message)?;
    }
    Ok(())
}

pub fn write_tasks<W: Write>(
    writer: &mut W,
    format: Format,
    view: &ViewSnapshot<Task>,
    noun: &str,
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, view);
    }
    if view.is_empty() {
        writeln!(writer, "No {noun} match.")?;
    }
    for task in &view.items {
        writeln!(writer, "{}", TaskLine(task))?;
    }
    footer(writer, view, noun)
}

#[derive(Debug, Serialize)]
pub struct GroupView<T> {
    pub key: String,
    pub items: Vec<T>,
}

pub fn labelled<K: fmt::Display, T: Clone>(groups: &Groups<K, T>) -> Vec<GroupView<T>> {
    groups
        .iter()
        .map(|group| GroupView {
            key: group.key.to_string(),
            items: group.items.clone(),
        })
        .collect()
}

pub fn write_task_groups<W: Write>(
    writer: &mut W,
    format: Format,
    groups: &[GroupView<Task>],
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, groups);
    }
    if groups.is_empty() {
        writeln!(writer, "Nothing to group.")?;
    }
    for group in groups {
        let key = if group.key.is_empty() {
            "unassigned"
        } else {
            group.key.as_str()
        };
        writeln!(writer, "{key} ({})", group.items.len())?;
        for task in &group.items {
            writeln!(writer, "  {}", TaskLine(task))?;
        }
    }
    Ok(())
}

pub fn write_bin<W: Write, T: Serialize>(
    writer: &mut W,
    format: Format,
    entries: &[BinEntry<T>],
    describe: impl Fn(&T) -> String,
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, entries);
    }
    if entries.is_empty() {
        writeln!(writer, "The bin is empty.")?;
    }
    for entry in entries {
        writeln!(
            writer,
            "{}  (deleted {})",
            describe(&entry.item),
            entry.deleted_at.format("%Y-%m-%d %H:%M")
        )?;
    }
    Ok(())
}

pub fn write_projects<W: Write>(
    writer: &mut W,
    format: Format,
    view: &ViewSnapshot<Project>,
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, view);
    }
    if view.is_empty() {
        writeln!(writer, "No projects match.")?;
    }
    for project in &view.items {
        writeln!(writer, "{}", ProjectLine(project))?;
    }
    footer(writer, view, "projects")
}

pub fn write_summaries<W: Write>(
    writer: &mut W,
    format: Format,
    summaries: &[ProjectSummary],
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, summaries);
    }
    for summary in summaries {
        writeln!(
            writer,
            "{:<32} {:<9} {:>2} tasks  {:>2} done  {:>2} open  {:>3}%",
            summary.project,
            summary.state.as_str(),
            summary.total,
            summary.completed,
            summary.pending,
            summary.progress
        )?;
    }
    Ok(())
}

pub fn write_topics<W: Write>(
    writer: &mut W,
    format: Format,
    view: &ViewSnapshot<Topic>,
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, view);
    }
    if view.is_empty() {
        writeln!(writer, "No topics match.")?;
    }
    for topic in &view.items {
        let tag = if topic.technical { "tech" } else { "general" };
        writeln!(
            writer,
            "{:<10} {:<40} {:<7} by {} on {}",
            topic.id,
            topic.title,
            tag,
            topic.created_by,
            day(topic.created_at)
        )?;
    }
    write_notice(writer, view.notice.as_ref())
}

pub fn write_posts<W: Write>(writer: &mut W, format: Format, posts: &[Post]) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, posts);
    }
    if posts.is_empty() {
        writeln!(writer, "No replies yet.")?;
    }
    for post in posts {
        let when = post
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(writer, "#{} {} at {}", post.id, post.user_id, when)?;
        writeln!(writer, "  {}", post.content)?;
    }
    Ok(())
}

pub fn write_employees<W: Write>(writer: &mut W, format: Format, employees: &[Employee]) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, employees);
    }
    for employee in employees {
        writeln!(
            writer,
            "{:<6} {:<24} {:<12} {}",
            employee.id,
            employee.name,
            employee.role.as_str(),
            employee.job_title
        )?;
    }
    Ok(())
}

pub fn write_workload<W: Write>(writer: &mut W, format: Format, rows: &[Workload]) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, rows);
    }
    for row in rows {
        writeln!(
            writer,
            "{:<6} {:<24} {:>2} tasks  {:>2} pending  {:>2} overdue",
            row.employee_id,
            row.name.as_deref().unwrap_or("?"),
            row.total,
            row.pending,
            row.overdue
        )?;
    }
    Ok(())
}

pub fn write_outcome<W: Write>(
    writer: &mut W,
    format: Format,
    noun: &str,
    outcome: &MutationOutcome,
) -> Result<()> {
    if format == Format::Json {
        return write_json(writer, outcome);
    }
    let verb = match outcome.action {
        "create" => "Created",
        "update" => "Updated",
        "toggle" => "Toggled",
        "delete" => "Moved to bin:",
        "restore" => "Restored",
        _ => "Deleted permanently:",
    };
    writeln!(writer, "{verb} {noun} {}", outcome.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Priority, TaskKind, TaskStatus};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn task(status: TaskStatus) -> Task {
        Task {
            id: "12".into(),
            kind: TaskKind::Individual,
            name: "Audit access".into(),
            description: String::new(),
            status,
            priority: Priority::High,
            due_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
            assigned_to: Some("4".into()),
            assigned_by: Some("1".into()),
            project_id: None,
        }
    }

    #[test]
    fn task_line_marks_completion_and_assignee() {
        let pending = TaskLine(&task(TaskStatus::Pending)).to_string();
        let done = TaskLine(&task(TaskStatus::Completed)).to_string();

        assert!(pending.starts_with("[ ] 12"));
        assert!(done.starts_with("[x] 12"));
        assert!(pending.contains("High"));
        assert!(pending.contains("due 2025-03-01"));
        assert!(pending.ends_with("-> 4"));
    }

    #[test]
    fn outcome_wording_follows_action() {
        let mut out = Vec::new();
        let outcome = MutationOutcome {
            action: "delete",
            id: "12".into(),
            reconciled: false,
        };
        write_outcome(&mut out, Format::Text, "to-do", &outcome).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Moved to bin: to-do 12\n");
    }

    #[test]
    fn json_outcome_is_machine_readable() {
        let mut out = Vec::new();
        let outcome = MutationOutcome {
            action: "create",
            id: "101".into(),
            reconciled: true,
        };
        write_outcome(&mut out, Format::Json, "to-do", &outcome).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["id"], "101");
        assert_eq!(value["reconciled"], true);
    }
}
