use anyhow::Result;

use crate::error::ValidationError;
use crate::model::{Priority, Project, Task, TaskKind, TaskStatus};
use crate::parser::parse_date_spec;

/// Normalized input for creating or editing a task from any client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub text: Vec<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub due: Option<String>,
    pub assignee: Option<String>,
}

impl TaskInput {
    pub fn title(&self) -> String {
        self.text.join(" ").trim().to_string()
    }

    pub fn require_text(&self) -> Result<(), ValidationError> {
        if self.title().is_empty() {
            return Err(ValidationError::Empty { field: "task name" });
        }
        Ok(())
    }

    /// Build a fresh task. The id stays empty until the dispatcher assigns one.
    pub fn into_task(self, kind: TaskKind) -> Result<Task> {
        self.require_text()?;
        let due_at = self.due.as_deref().map(parse_date_spec).transpose()?;
        Ok(Task {
            id: String::new(),
            kind,
            name: self.title(),
            description: self.description.unwrap_or_default().trim().to_string(),
            status: self.status.unwrap_or(TaskStatus::Pending),
            priority: self.priority.unwrap_or_default(),
            due_at,
            assigned_to: clean(self.assignee),
            assigned_by: None,
            project_id: None,
        })
    }

    /// Overlay the fields that were provided onto an existing task.
    pub fn apply_to(self, task: &mut Task) -> Result<()> {
        if !self.text.is_empty() {
            self.require_text()?;
            task.name = self.title();
        }
        if let Some(description) = self.description {
            task.description = description.trim().to_string();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due) = self.due.as_deref() {
            task.due_at = match due.trim() {
                "" | "none" | "clear" => None,
                spec => Some(parse_date_spec(spec)?),
            };
        }
        if let Some(assignee) = self.assignee {
            task.assigned_to = clean(Some(assignee));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectInput {
    pub name: Vec<String>,
    pub description: Option<String>,
    pub team_leader: Option<String>,
    pub employees: Vec<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<String>,
}

impl ProjectInput {
    fn title(&self) -> String {
        self.name.join(" ").trim().to_string()
    }

    pub fn into_project(self) -> Result<Project> {
        let name = self.title();
        if name.is_empty() {
            return Err(ValidationError::Empty {
                field: "project name",
            }
            .into());
        }
        let deadline = self.deadline.as_deref().map(parse_date_spec).transpose()?;
        Ok(Project {
            id: String::new(),
            name,
            description: self.description.unwrap_or_default().trim().to_string(),
            employee_ids: member_ids(&self.employees),
            team_leader_id: clean(self.team_leader),
            priority: self.priority.unwrap_or_default(),
            deadline,
            tasks: Vec::new(),
            completed: false,
            binned: false,
            progress: 0,
        })
    }

    /// Overlay the provided fields onto an existing project. An empty member
    /// list leaves the members unchanged.
    pub fn apply_to(self, project: &mut Project) -> Result<()> {
        if !self.name.is_empty() {
            let name = self.title();
            if name.is_empty() {
                return Err(ValidationError::Empty {
                    field: "project name",
                }
                .into());
            }
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = description.trim().to_string();
        }
        if let Some(priority) = self.priority {
            project.priority = priority;
        }
        if let Some(deadline) = self.deadline.as_deref() {
            project.deadline = match deadline.trim() {
                "" | "none" | "clear" => None,
                spec => Some(parse_date_spec(spec)?),
            };
        }
        if self.team_leader.is_some() {
            project.team_leader_id = clean(self.team_leader);
        }
        if !self.employees.is_empty() {
            project.employee_ids = member_ids(&self.employees);
        }
        Ok(())
    }
}

fn member_ids(raw: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builds_task_from_words() {
        let input = TaskInput {
            text: words("Write   report"),
            priority: Some(Priority::High),
            due: Some("2025-03-01".into()),
            ..TaskInput::default()
        };

        let task = input.into_task(TaskKind::Todo).unwrap();

        assert_eq!(task.name, "Write report");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(
            task.due_at.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2025-03-01".to_string())
        );
    }

    #[test]
    fn empty_text_is_rejected() {
        let err = TaskInput::default().into_task(TaskKind::Todo).unwrap_err();
        assert_eq!(err.to_string(), "task name cannot be empty");
    }

    #[test]
    fn apply_keeps_unset_fields_and_clears_due() {
        let mut task = TaskInput {
            text: words("Draft plan"),
            due: Some("2025-01-10".into()),
            description: Some("first pass".into()),
            ..TaskInput::default()
        }
        .into_task(TaskKind::Individual)
        .unwrap();

        TaskInput {
            due: Some("none".into()),
            priority: Some(Priority::Low),
            ..TaskInput::default()
        }
        .apply_to(&mut task)
        .unwrap();

        assert_eq!(task.name, "Draft plan");
        assert_eq!(task.description, "first pass");
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.due_at, None);
    }

    #[test]
    fn project_members_accept_commas_and_dedupe() {
        let project = ProjectInput {
            name: words("Helpdesk"),
            employees: vec!["3,4".into(), "4".into(), " 5 ".into()],
            ..ProjectInput::default()
        }
        .into_project()
        .unwrap();

        assert_eq!(project.employee_ids, vec!["3", "4", "5"]);
        assert_eq!(project.priority, Priority::Medium);
    }

    #[test]
    fn project_edit_overlays_members_and_deadline() {
        let mut project = ProjectInput {
            name: words("Helpdesk"),
            employees: vec!["3".into()],
            deadline: Some("2025-06-30".into()),
            ..ProjectInput::default()
        }
        .into_project()
        .unwrap();

        ProjectInput {
            employees: vec!["3,4".into()],
            deadline: Some("clear".into()),
            ..ProjectInput::default()
        }
        .apply_to(&mut project)
        .unwrap();

        assert_eq!(project.name, "Helpdesk");
        assert_eq!(project.employee_ids, vec!["3", "4"]);
        assert_eq!(project.deadline, None);
    }
}
