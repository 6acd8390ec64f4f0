use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::Backend;
use crate::dispatch::{Dispatcher, Remote, Workspace};
use crate::model::{Entity, Trackable, ViewCriteria};
use crate::session::Session;
use crate::store::{LoadState, Notice};
use crate::telemetry::{self, Event};
use crate::view::derive_view;

pub mod account;
pub mod forum;
pub mod projects;
pub mod tasks;
pub mod team;
pub mod todos;

pub use account::AccountService;
pub use forum::ForumService;
pub use projects::{ProjectTasksService, ProjectsService};
pub use tasks::TasksService;
pub use team::TeamService;
pub use todos::TodosService;

/// A filtered, sorted view of one collection plus the state needed to render it.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot<T> {
    pub collection: &'static str,
    pub items: Vec<T>,
    /// Active items before filtering.
    pub total: usize,
    pub binned: usize,
    pub state: LoadState,
    pub notice: Option<Notice>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl<T> ViewSnapshot<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Entity> ViewSnapshot<T> {
    /// `items` must be derived from `workspace` under the same lock.
    pub(crate) fn of(workspace: &Workspace<T>, items: Vec<T>) -> Self {
        Self {
            collection: workspace.active.name(),
            items,
            total: workspace.active.items().len(),
            binned: workspace.bin.len(),
            state: workspace.active.state().clone(),
            notice: workspace.active.notice().cloned(),
            last_refreshed: workspace.active.last_refreshed(),
        }
    }
}

pub(crate) fn snapshot<T, R>(dispatcher: &Dispatcher<T, R>, criteria: &ViewCriteria) -> ViewSnapshot<T>
where
    T: Trackable,
    R: Remote<T>,
{
    dispatcher.with_workspace(|workspace| {
        ViewSnapshot::of(workspace, derive_view(workspace.active.items(), criteria))
    })
}

/// Every view-model available to one signed-in user.
#[derive(Clone)]
pub struct Dashboard {
    session: Session,
    backend: Arc<dyn Backend>,
    telemetry: Arc<telemetry::Handle>,
    todos: TodosService,
    tasks: TasksService,
    projects: ProjectsService,
    forum: ForumService,
    team: TeamService,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, session: Session) -> Self {
        Self::with_telemetry(backend, session, Arc::new(telemetry::Handle::new()))
    }

    pub fn with_telemetry(
        backend: Arc<dyn Backend>,
        session: Session,
        telemetry: Arc<telemetry::Handle>,
    ) -> Self {
        telemetry.record(Event::SessionStarted {
            user_id: session.user_id.clone(),
            role: session.role.to_string(),
        });
        Self {
            todos: TodosService::new(Arc::clone(&backend), session.clone(), Arc::clone(&telemetry)),
            tasks: TasksService::new(Arc::clone(&backend), session.clone(), Arc::clone(&telemetry)),
            projects: ProjectsService::new(
                Arc::clone(&backend),
                session.clone(),
                Arc::clone(&telemetry),
            ),
            forum: ForumService::new(Arc::clone(&backend), session.clone(), Arc::clone(&telemetry)),
            team: TeamService::new(Arc::clone(&backend), session.clone()),
            session,
            backend,
            telemetry,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn telemetry(&self) -> &Arc<telemetry::Handle> {
        &self.telemetry
    }

    pub fn todos(&self) -> &TodosService {
        &self.todos
    }

    pub fn tasks(&self) -> &TasksService {
        &self.tasks
    }

    pub fn projects(&self) -> &ProjectsService {
        &self.projects
    }

    pub fn forum(&self) -> &ForumService {
        &self.forum
    }

    pub fn team(&self) -> &TeamService {
        &self.team
    }

    /// Detach every view so late responses are dropped.
    pub fn close(&self) {
        self.todos.close();
        self.tasks.close();
        self.projects.close();
        self.forum.close();
        self.telemetry.record(Event::SessionEnded);
    }
}
