use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::api::Backend;
use crate::group::group_by;
use crate::model::{Employee, Task, Workload};
use crate::session::Session;

/// Employee directory and the manager's workload overview.
#[derive(Clone)]
pub struct TeamService {
    backend: Arc<dyn Backend>,
    session: Session,
}

impl TeamService {
    pub fn new(backend: Arc<dyn Backend>, session: Session) -> Self {
        Self { backend, session }
    }

    pub async fn employees(&self) -> Result<Vec<Employee>> {
        Ok(self.backend.list_employees().await?)
    }

    pub async fn workload(&self) -> Result<Vec<Workload>> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.view_workload, "view team workload")?;
        let employees = self.backend.list_employees().await?;
        let tasks = self.backend.list_tasks(&self.session.user_id).await?;
        Ok(workload(&tasks, &employees, Utc::now()))
    }
}

/// Per-assignee task counts, in order of first appearance. Employees with no
/// tasks follow with zero counts.
pub fn workload(tasks: &[Task], employees: &[Employee], now: DateTime<Utc>) -> Vec<Workload> {
    let groups = group_by(tasks, |task| task.assigned_to.clone().unwrap_or_default());
    let name_of = |id: &str| {
        employees
            .iter()
            .find(|employee| employee.id == id)
            .map(|employee| employee.name.clone())
    };

    let mut rows: Vec<Workload> = groups
        .iter()
        .filter(|group| !group.key.is_empty())
        .map(|group| {
            let pending: Vec<&Task> = group
                .items
                .iter()
                .filter(|task| !task.status.is_completed())
                .collect();
            Workload {
                employee_id: group.key.clone(),
                name: name_of(&group.key),
                total: group.items.len(),
                pending: pending.len(),
                overdue: pending
                    .iter()
                    .filter(|task| task.due_at.is_some_and(|due| due < now))
                    .count(),
            }
        })
        .collect();

    for employee in employees {
        if !rows.iter().any(|row| row.employee_id == employee.id) {
            rows.push(Workload {
                employee_id: employee.id.clone(),
                name: Some(employee.name.clone()),
                total: 0,
                pending: 0,
                overdue: 0,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::model::Role;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn manager_sees_counts_per_employee() {
        let backend = Arc::new(MemoryBackend::with_sample_data());
        let team = TeamService::new(backend, Session::new("1", Role::Manager, None));

        let rows = team.workload().await.unwrap();
        let summary: Vec<(&str, usize, usize, usize)> = rows
            .iter()
            .map(|row| (row.employee_id.as_str(), row.total, row.pending, row.overdue))
            .collect();

        assert_eq!(
            summary,
            vec![("3", 1, 1, 0), ("4", 2, 1, 1), ("1", 0, 0, 0), ("2", 0, 0, 0)]
        );
        assert_eq!(rows[0].name.as_deref(), Some("Priya Shah"));
    }

    #[tokio::test]
    async fn employees_cannot_view_workload() {
        let backend = Arc::new(MemoryBackend::with_sample_data());
        let team = TeamService::new(backend, Session::new("3", Role::Employee, None));

        assert!(team.workload().await.is_err());
        assert_eq!(team.employees().await.unwrap().len(), 4);
    }
}
