use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{snapshot, ViewSnapshot};
use crate::api::Backend;
use crate::dispatch::{Dispatcher, Mutation, MutationOutcome, Remote};
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::group::{group_by, Groups};
use crate::input::TaskInput;
use crate::model::{Task, TaskKind, TaskStatus, ViewCriteria};
use crate::recycle::BinEntry;
use crate::session::Session;
use crate::store::LoadOutcome;
use crate::telemetry;
use crate::validation;

/// Individual tasks a manager hands out to employees.
pub struct TaskRemote {
    backend: Arc<dyn Backend>,
    user_id: String,
}

#[async_trait]
impl Remote<Task> for TaskRemote {
    fn collection(&self) -> &'static str {
        "tasks"
    }

    async fn fetch(&self) -> ClientResult<Vec<Task>> {
        self.backend.list_tasks(&self.user_id).await
    }

    async fn create(&self, item: &Task) -> ClientResult<Option<String>> {
        Ok(self.backend.create_task(item).await?.id)
    }

    async fn update(&self, item: &Task) -> ClientResult<()> {
        self.backend.update_task(item).await?;
        Ok(())
    }

    async fn delete(&self, item: &Task) -> ClientResult<()> {
        self.backend.delete_task(&item.id).await?;
        Ok(())
    }

    fn validate(&self, item: &Task) -> Result<(), ValidationError> {
        validation::validate_task(item)?;
        match item.assigned_to.as_deref().map(str::trim) {
            Some(assignee) if !assignee.is_empty() => Ok(()),
            _ => Err(ValidationError::MissingAssignee),
        }
    }
}

#[derive(Clone)]
pub struct TasksService {
    session: Session,
    dispatcher: Dispatcher<Task, TaskRemote>,
}

impl TasksService {
    pub fn new(backend: Arc<dyn Backend>, session: Session, telemetry: Arc<telemetry::Handle>) -> Self {
        let remote = TaskRemote {
            backend,
            user_id: session.user_id.clone(),
        };
        Self {
            session,
            dispatcher: Dispatcher::new(remote, telemetry),
        }
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.dispatcher.refresh().await
    }

    pub fn list(&self, criteria: &ViewCriteria) -> ViewSnapshot<Task> {
        snapshot(&self.dispatcher, criteria)
    }

    pub fn by_assignee(&self, criteria: &ViewCriteria) -> Groups<String, Task> {
        group_by(&self.dispatcher.view(criteria), |task| {
            task.assigned_to.clone().unwrap_or_else(|| "unassigned".to_string())
        })
    }

    pub fn by_status(&self, criteria: &ViewCriteria) -> Groups<TaskStatus, Task> {
        group_by(&self.dispatcher.view(criteria), |task| task.status)
    }

    pub fn bin(&self) -> Vec<BinEntry<Task>> {
        self.dispatcher.snapshot().bin
    }

    pub fn items(&self) -> Vec<Task> {
        self.dispatcher.items()
    }

    /// Hand a new task to an employee. Only roles that may assign work can do this.
    pub async fn assign(&self, input: TaskInput) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.assign_tasks, "assign tasks")?;
        let mut task = input.into_task(TaskKind::Individual)?;
        task.assigned_by = Some(self.session.user_id.clone());
        Ok(self.dispatcher.submit(Mutation::Create(task)).await?)
    }

    pub async fn edit(&self, id: &str, input: TaskInput) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.assign_tasks, "edit assigned tasks")?;
        let mut task = self.find(id)?;
        input.apply_to(&mut task)?;
        Ok(self.dispatcher.submit(Mutation::Update(task)).await?)
    }

    /// Assignees may flip completion on their own tasks; assigners on any.
    pub async fn toggle(&self, id: &str) -> Result<MutationOutcome> {
        let task = self.find(id)?;
        let own = task.assigned_to.as_deref() == Some(self.session.user_id.as_str());
        self.session
            .ensure(own || self.session.capabilities().assign_tasks, "complete this task")?;
        Ok(self
            .dispatcher
            .submit(Mutation::ToggleStatus(id.to_string()))
            .await?)
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.assign_tasks, "delete tasks")?;
        Ok(self.dispatcher.submit(Mutation::Delete(id.to_string())).await?)
    }

    pub async fn restore(&self, id: &str) -> Result<MutationOutcome> {
        Ok(self.dispatcher.submit(Mutation::Restore(id.to_string())).await?)
    }

    pub async fn purge(&self, id: &str) -> Result<MutationOutcome> {
        Ok(self
            .dispatcher
            .submit(Mutation::PermanentDelete(id.to_string()))
            .await?)
    }

    pub fn close(&self) {
        self.dispatcher.close();
    }

    fn find(&self, id: &str) -> Result<Task, ClientError> {
        self.dispatcher.get(id).ok_or_else(|| ClientError::NotFound {
            collection: "tasks",
            id: id.to_string(),
        })
    }
}
