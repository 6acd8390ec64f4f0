use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{snapshot, ViewSnapshot};
use crate::api::Backend;
use crate::dispatch::{Dispatcher, Mutation, MutationOutcome, Remote};
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::group::{group_by, Groups};
use crate::input::{ProjectInput, TaskInput};
use crate::model::{
    Employee, Project, ProjectState, ProjectSummary, Task, TaskKind, TaskStatus, ViewCriteria,
};
use crate::recycle::BinEntry;
use crate::session::Session;
use crate::store::LoadOutcome;
use crate::telemetry;
use crate::validation;

pub struct ProjectRemote {
    backend: Arc<dyn Backend>,
    session: Session,
}

#[async_trait]
impl Remote<Project> for ProjectRemote {
    fn collection(&self) -> &'static str {
        "projects"
    }

    async fn fetch(&self) -> ClientResult<Vec<Project>> {
        let projects = self.backend.list_projects().await?;
        if self.session.capabilities().view_all_projects {
            return Ok(projects);
        }
        let user = self.session.user_id.as_str();
        Ok(projects
            .into_iter()
            .filter(|project| {
                project.team_leader_id.as_deref() == Some(user) || project.has_member(user)
            })
            .collect())
    }

    async fn create(&self, item: &Project) -> ClientResult<Option<String>> {
        Ok(self.backend.create_project(item).await?.id)
    }

    async fn update(&self, item: &Project) -> ClientResult<()> {
        self.backend.update_project(item).await?;
        Ok(())
    }

    async fn delete(&self, item: &Project) -> ClientResult<()> {
        self.backend.delete_project(&item.id).await?;
        Ok(())
    }

    fn persists_bin(&self) -> bool {
        true
    }

    async fn bin(&self, item: &Project) -> ClientResult<()> {
        self.backend
            .update_project_field(&item.id, "binned", Value::Bool(true))
            .await?;
        Ok(())
    }

    async fn unbin(&self, item: &Project) -> ClientResult<()> {
        self.backend
            .update_project_field(&item.id, "binned", Value::Bool(false))
            .await?;
        Ok(())
    }

    fn validate(&self, item: &Project) -> Result<(), ValidationError> {
        validation::validate_project(item)
    }
}

#[derive(Clone)]
pub struct ProjectsService {
    backend: Arc<dyn Backend>,
    session: Session,
    telemetry: Arc<telemetry::Handle>,
    dispatcher: Dispatcher<Project, ProjectRemote>,
    task_views: Arc<Mutex<HashMap<String, ProjectTasksService>>>,
}

impl ProjectsService {
    pub fn new(backend: Arc<dyn Backend>, session: Session, telemetry: Arc<telemetry::Handle>) -> Self {
        let remote = ProjectRemote {
            backend: Arc::clone(&backend),
            session: session.clone(),
        };
        Self {
            dispatcher: Dispatcher::new(remote, Arc::clone(&telemetry)),
            backend,
            session,
            telemetry,
            task_views: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.dispatcher.refresh().await
    }

    pub fn list(&self, criteria: &ViewCriteria) -> ViewSnapshot<Project> {
        snapshot(&self.dispatcher, criteria)
    }

    pub fn get(&self, id: &str) -> Option<Project> {
        self.dispatcher.get(id)
    }

    pub fn summaries(&self, criteria: &ViewCriteria) -> Vec<ProjectSummary> {
        self.dispatcher
            .view(criteria)
            .iter()
            .map(ProjectSummary::from)
            .collect()
    }

    /// Active and completed projects followed by the binned ones.
    pub fn by_state(&self) -> Groups<ProjectState, Project> {
        let workspace = self.dispatcher.snapshot();
        let mut all = workspace.items;
        all.extend(workspace.bin.into_iter().map(|entry| {
            let mut project = entry.item;
            project.binned = true;
            project
        }));
        group_by(&all, Project::state)
    }

    pub fn bin(&self) -> Vec<BinEntry<Project>> {
        self.dispatcher.snapshot().bin
    }

    pub async fn team_leader(&self, project_id: &str) -> Result<Option<Employee>> {
        Ok(self.backend.team_leader(project_id).await?)
    }

    pub async fn create(&self, input: ProjectInput) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_projects, "create projects")?;
        let project = input.into_project()?;
        Ok(self.dispatcher.submit(Mutation::Create(project)).await?)
    }

    pub async fn update(&self, project: Project) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_projects, "edit projects")?;
        Ok(self.dispatcher.submit(Mutation::Update(project)).await?)
    }

    /// Mark a project completed or reopen it. Its team leader may do this too.
    pub async fn toggle_complete(&self, id: &str) -> Result<MutationOutcome> {
        let project = self.find(id)?;
        let leads = project.team_leader_id.as_deref() == Some(self.session.user_id.as_str());
        self.session.ensure(
            leads || self.session.capabilities().manage_projects,
            "complete projects",
        )?;
        Ok(self
            .dispatcher
            .submit(Mutation::ToggleStatus(id.to_string()))
            .await?)
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_projects, "delete projects")?;
        Ok(self.dispatcher.submit(Mutation::Delete(id.to_string())).await?)
    }

    pub async fn restore(&self, id: &str) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_projects, "restore projects")?;
        Ok(self.dispatcher.submit(Mutation::Restore(id.to_string())).await?)
    }

    pub async fn purge(&self, id: &str) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_projects, "delete projects")?;
        let outcome = self
            .dispatcher
            .submit(Mutation::PermanentDelete(id.to_string()))
            .await?;
        if let Some(view) = self.task_views.lock().remove(id) {
            view.close();
        }
        Ok(outcome)
    }

    /// Task view for one loaded project, reused for the lifetime of this service.
    pub fn tasks(&self, project_id: &str) -> Result<ProjectTasksService> {
        let project = self.find(project_id)?;
        let mut views = self.task_views.lock();
        let view = views
            .entry(project.id.clone())
            .or_insert_with(|| {
                ProjectTasksService::new(
                    Arc::clone(&self.backend),
                    self.session.clone(),
                    &project,
                    Arc::clone(&self.telemetry),
                )
            })
            .clone();
        view.set_members(project.employee_ids.clone());
        Ok(view)
    }

    pub fn close(&self) {
        self.dispatcher.close();
        for view in self.task_views.lock().values() {
            view.close();
        }
    }

    fn find(&self, id: &str) -> Result<Project, ClientError> {
        self.dispatcher.get(id).ok_or_else(|| ClientError::NotFound {
            collection: "projects",
            id: id.to_string(),
        })
    }
}

pub struct ProjectTaskRemote {
    backend: Arc<dyn Backend>,
    project_id: String,
    members: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Remote<Task> for ProjectTaskRemote {
    fn collection(&self) -> &'static str {
        "project tasks"
    }

    async fn fetch(&self) -> ClientResult<Vec<Task>> {
        self.backend.project_tasks(&self.project_id).await
    }

    async fn create(&self, item: &Task) -> ClientResult<Option<String>> {
        Ok(self.backend.create_project_task(item).await?.id)
    }

    async fn update(&self, item: &Task) -> ClientResult<()> {
        self.backend.update_project_task(item).await?;
        Ok(())
    }

    async fn delete(&self, item: &Task) -> ClientResult<()> {
        self.backend.delete_project_task(&item.id).await?;
        Ok(())
    }

    fn validate(&self, item: &Task) -> Result<(), ValidationError> {
        let members = self.members.lock();
        validation::validate_project_task(item, &self.project_id, &members)
    }
}

#[derive(Clone)]
pub struct ProjectTasksService {
    session: Session,
    project_id: String,
    members: Arc<Mutex<Vec<String>>>,
    dispatcher: Dispatcher<Task, ProjectTaskRemote>,
}

impl ProjectTasksService {
    fn new(
        backend: Arc<dyn Backend>,
        session: Session,
        project: &Project,
        telemetry: Arc<telemetry::Handle>,
    ) -> Self {
        let members = Arc::new(Mutex::new(project.employee_ids.clone()));
        let remote = ProjectTaskRemote {
            backend,
            project_id: project.id.clone(),
            members: Arc::clone(&members),
        };
        Self {
            session,
            project_id: project.id.clone(),
            members,
            dispatcher: Dispatcher::new(remote, telemetry),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn set_members(&self, members: Vec<String>) {
        *self.members.lock() = members;
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.dispatcher.refresh().await
    }

    pub fn list(&self, criteria: &ViewCriteria) -> ViewSnapshot<Task> {
        snapshot(&self.dispatcher, criteria)
    }

    pub fn by_assignee(&self, criteria: &ViewCriteria) -> Groups<String, Task> {
        group_by(&self.dispatcher.view(criteria), |task| {
            task.assigned_to.clone().unwrap_or_default()
        })
    }

    pub fn by_status(&self, criteria: &ViewCriteria) -> Groups<TaskStatus, Task> {
        group_by(&self.dispatcher.view(criteria), |task| task.status)
    }

    pub fn bin(&self) -> Vec<BinEntry<Task>> {
        self.dispatcher.snapshot().bin
    }

    pub async fn add(&self, input: TaskInput) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_project_tasks, "add project tasks")?;
        let mut task = input.into_task(TaskKind::Project)?;
        task.project_id = Some(self.project_id.clone());
        task.assigned_by = Some(self.session.user_id.clone());
        Ok(self.dispatcher.submit(Mutation::Create(task)).await?)
    }

    pub async fn edit(&self, id: &str, input: TaskInput) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_project_tasks, "edit project tasks")?;
        let mut task = self.find(id)?;
        input.apply_to(&mut task)?;
        Ok(self.dispatcher.submit(Mutation::Update(task)).await?)
    }

    pub async fn toggle(&self, id: &str) -> Result<MutationOutcome> {
        let task = self.find(id)?;
        let own = task.assigned_to.as_deref() == Some(self.session.user_id.as_str());
        self.session.ensure(
            own || self.session.capabilities().manage_project_tasks,
            "complete this task",
        )?;
        Ok(self
            .dispatcher
            .submit(Mutation::ToggleStatus(id.to_string()))
            .await?)
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        let caps = self.session.capabilities();
        self.session.ensure(caps.manage_project_tasks, "delete project tasks")?;
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
            collection: "project tasks",
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::model::Role;
    use pretty_assertions::assert_eq;

    async fn loaded(user: &str, role: Role) -> (Arc<MemoryBackend>, ProjectsService) {
        let backend = Arc::new(MemoryBackend::with_sample_data());
        let service = ProjectsService::new(
            backend.clone(),
            Session::new(user, role, None),
            Arc::new(telemetry::Handle::new()),
        );
        service.refresh().await;
        (backend, service)
    }

    fn helpdesk(service: &ProjectsService) -> Project {
        service.list(&ViewCriteria::default()).items[0].clone()
    }

    #[tokio::test]
    async fn foreign_assignee_is_rejected_without_network_call() {
        let (backend, service) = loaded("2", Role::TeamLeader).await;
        let tasks = service.tasks(&helpdesk(&service).id).unwrap();
        tasks.refresh().await;
        let before = backend.request_count();

        let err = tasks
            .add(TaskInput {
                text: vec!["Write docs".into()],
                assignee: Some("99".into()),
                ..TaskInput::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Validation(
                ValidationError::AssigneeNotInProject { .. }
            ))
        ));
        assert_eq!(backend.request_count(), before);
        assert_eq!(tasks.list(&ViewCriteria::default()).items.len(), 2);
    }

    #[tokio::test]
    async fn member_assignee_is_accepted() {
        let (_backend, service) = loaded("2", Role::TeamLeader).await;
        let tasks = service.tasks(&helpdesk(&service).id).unwrap();
        tasks.refresh().await;

        tasks
            .add(TaskInput {
                text: vec!["Write docs".into()],
                assignee: Some("3".into()),
                ..TaskInput::default()
            })
            .await
            .unwrap();

        let groups = tasks.by_assignee(&ViewCriteria::default());
        assert_eq!(groups.get(&"3".to_string()).map(<[Task]>::len), Some(2));
    }

    #[tokio::test]
    async fn server_binned_projects_are_grouped_separately() {
        let (_backend, service) = loaded("1", Role::Manager).await;

        let groups = service.by_state();
        let keys: Vec<ProjectState> = groups.keys().copied().collect();
        assert_eq!(keys, vec![ProjectState::Active, ProjectState::Binned]);
        assert_eq!(service.list(&ViewCriteria::default()).total, 1);
    }

    #[tokio::test]
    async fn manager_bins_and_restores_through_server_flag() {
        let (backend, service) = loaded("1", Role::Manager).await;
        let id = helpdesk(&service).id;

        service.delete(&id).await.unwrap();
        assert!(backend.list_projects().await.unwrap()[0].binned);
        assert_eq!(service.bin().len(), 2);

        service.restore(&id).await.unwrap();
        assert!(!backend.list_projects().await.unwrap()[0].binned);
        assert_eq!(service.list(&ViewCriteria::default()).total, 1);
    }

    #[tokio::test]
    async fn employees_only_see_their_projects() {
        let (_backend, service) = loaded("3", Role::Employee).await;
        let view = service.list(&ViewCriteria::default());
        assert_eq!(view.total, 1);
        assert!(service.bin().is_empty());

        let err = service
            .create(ProjectInput {
                name: vec!["Side quest".into()],
                ..ProjectInput::default()
            })
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
    }

    #[tokio::test]
    async fn summaries_report_progress() {
        let (_backend, service) = loaded("1", Role::Manager).await;
        let summaries = service.summaries(&ViewCriteria::default());
        assert_eq!(summaries.len(), 1);
        assert_eq!(
            (summaries[0].total, summaries[0].completed, summaries[0].progress),
            (2, 1, 50)
        );
    }
}
