use crate::error::ValidationError;
use crate::model::{Post, Project, Task, Topic};

pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

pub fn validate_task(task: &Task) -> Result<(), ValidationError> {
    require_text("task name", &task.name)
}

/// Project tasks must name exactly one assignee drawn from the project's members.
pub fn validate_project_task(
    task: &Task,
    project_id: &str,
    employee_ids: &[String],
) -> Result<(), ValidationError> {
    validate_task(task)?;
    let assignee = task
        .assigned_to
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingAssignee)?;
    if !employee_ids.iter().any(|id| id == assignee) {
        return Err(ValidationError::AssigneeNotInProject {
            assignee: assignee.to_string(),
            project: project_id.to_string(),
        });
    }
    Ok(())
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    require_text("project name", &project.name)?;
    if let Some(leader) = &project.team_leader_id {
        if leader.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "team leader",
            });
        }
    }
    for task in &project.tasks {
        validate_project_task(task, &project.id, &project.employee_ids)?;
    }
    Ok(())
}

pub fn validate_topic(topic: &Topic) -> Result<(), ValidationError> {
    require_text("topic title", &topic.title)?;
    require_text("topic description", &topic.description)
}

pub fn validate_post(post: &Post) -> Result<(), ValidationError> {
    require_text("post content", &post.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskKind, TaskStatus};

    fn project_task(assignee: Option<&str>) -> Task {
        Task {
            id: "t1".into(),
            kind: TaskKind::Project,
            name: "Wire up API".into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::High,
            due_at: None,
            assigned_to: assignee.map(str::to_string),
            assigned_by: None,
            project_id: Some("p1".into()),
        }
    }

    #[test]
    fn rejects_assignee_outside_project() {
        let members = vec!["3".to_string(), "4".to_string()];
        let err = validate_project_task(&project_task(Some("9")), "p1", &members).unwrap_err();
        assert_eq!(
            err,
            ValidationError::AssigneeNotInProject {
                assignee: "9".into(),
                project: "p1".into()
            }
        );
        assert!(validate_project_task(&project_task(Some("4")), "p1", &members).is_ok());
    }

    #[test]
    fn requires_an_assignee() {
        let members = vec!["3".to_string()];
        assert_eq!(
            validate_project_task(&project_task(None), "p1", &members),
            Err(ValidationError::MissingAssignee)
        );
        assert_eq!(
            validate_project_task(&project_task(Some("  ")), "p1", &members),
            Err(ValidationError::MissingAssignee)
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut task = project_task(Some("3"));
        task.name = "   ".into();
        assert_eq!(
            validate_task(&task),
            Err(ValidationError::Empty { field: "task name" })
        );
    }
}
