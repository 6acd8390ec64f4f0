//! In-process backend used for `--demo` sessions and tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{Backend, ProfileUpdate, TopicQuery};
use crate::error::{ClientError, ClientResult};
use crate::model::{Employee, Post, Priority, Project, Role, Task, TaskKind, TaskStatus, Topic};
use crate::normalize::{loose_bool, loose_priority, loose_status, AccountReply, WriteAck};

#[derive(Debug, Clone)]
struct Account {
    employee: Employee,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: Vec<Account>,
    todos: Vec<(String, Task)>,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    project_tasks: Vec<Task>,
    topics: Vec<Topic>,
    posts: Vec<Post>,
    next_id: u64,
    fail_next: Option<ClientError>,
    offline: bool,
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    requests: AtomicUsize,
}

#[derive(Clone, Copy)]
struct SampleAccount {
    id: &'static str,
    name: &'static str,
    job_title: &'static str,
    role: Role,
    skills: &'static [&'static str],
}

const SAMPLE_PASSWORD: &str = "demo";

const SAMPLE_ACCOUNTS: &[SampleAccount] = &[
    SampleAccount {
        id: "1",
        name: "Maria Lopez",
        job_title: "Engineering Manager",
        role: Role::Manager,
        skills: &["planning", "hiring"],
    },
    SampleAccount {
        id: "2",
        name: "Sam Carter",
        job_title: "Tech Lead",
        role: Role::TeamLeader,
        skills: &["rust", "architecture"],
    },
    SampleAccount {
        id: "3",
        name: "Priya Shah",
        job_title: "Backend Developer",
        role: Role::Employee,
        skills: &["php", "sql"],
    },
    SampleAccount {
        id: "4",
        name: "Tom Becker",
        job_title: "Frontend Developer",
        role: Role::Employee,
        skills: &["react", "css"],
    },
];

#[derive(Clone, Copy)]
struct SampleTask {
    name: &'static str,
    description: &'static str,
    priority: Priority,
    due_in_days: Option<i64>,
    completed: bool,
    assignee: &'static str,
}

const SAMPLE_TODOS: &[SampleTask] = &[
    SampleTask {
        name: "Review weekly metrics",
        description: "Check dashboards before Monday stand-up",
        priority: Priority::High,
        due_in_days: Some(1),
        completed: false,
        assignee: "3",
    },
    SampleTask {
        name: "Update onboarding notes",
        description: "Add the new VPN steps",
        priority: Priority::Low,
        due_in_days: None,
        completed: false,
        assignee: "3",
    },
    SampleTask {
        name: "Book team offsite",
        description: "Compare two venues",
        priority: Priority::Medium,
        due_in_days: Some(14),
        completed: true,
        assignee: "1",
    },
];

const SAMPLE_TASKS: &[SampleTask] = &[
    SampleTask {
        name: "Prepare quarterly report",
        description: "Numbers for Q3 review",
        priority: Priority::High,
        due_in_days: Some(3),
        completed: false,
        assignee: "3",
    },
    SampleTask {
        name: "Audit access rights",
        description: "Remove stale accounts",
        priority: Priority::Medium,
        due_in_days: Some(-2),
        completed: false,
        assignee: "4",
    },
    SampleTask {
        name: "Refresh style guide",
        description: "Align buttons with the new palette",
        priority: Priority::Low,
        due_in_days: Some(10),
        completed: true,
        assignee: "4",
    },
];

const SAMPLE_PROJECT_TASKS: &[SampleTask] = &[
    SampleTask {
        name: "Design schema",
        description: "Tables for tickets and comments",
        priority: Priority::High,
        due_in_days: Some(5),
        completed: true,
        assignee: "3",
    },
    SampleTask {
        name: "Build ticket list view",
        description: "Filters by status and priority",
        priority: Priority::Medium,
        due_in_days: Some(12),
        completed: false,
        assignee: "4",
    },
];

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend preloaded with a small team, their work and a forum thread.
    pub fn with_sample_data() -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock();
            seed(&mut state);
        }
        backend
    }

    pub fn add_account(&self, employee: Employee, password: &str) {
        self.state.lock().accounts.push(Account {
            employee,
            password: password.to_string(),
        });
    }

    /// Insert a todo directly, bypassing the request counter.
    pub fn insert_todo(&self, user_id: &str, mut todo: Task) -> String {
        let mut state = self.state.lock();
        if todo.id.is_empty() {
            todo.id = state.allocate_id();
        }
        let id = todo.id.clone();
        state.todos.push((user_id.to_string(), todo));
        id
    }

    pub fn insert_project(&self, mut project: Project) -> String {
        let mut state = self.state.lock();
        if project.id.is_empty() {
            project.id = state.allocate_id();
        }
        let id = project.id.clone();
        for task in std::mem::take(&mut project.tasks) {
            let mut task = task;
            if task.id.is_empty() {
                task.id = state.allocate_id();
            }
            task.project_id = Some(id.clone());
            state.project_tasks.push(task);
        }
        state.projects.push(project);
        id
    }

    /// Make the next request fail with `error`.
    pub fn fail_next(&self, error: ClientError) {
        self.state.lock().fail_next = Some(error);
    }

    /// While offline every request fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn enter(&self, endpoint: &str) -> ClientResult<parking_lot::MutexGuard<'_, State>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        debug!(endpoint, "memory backend request");
        if state.offline {
            return Err(ClientError::Transport(format!(
                "{endpoint}: backend unreachable"
            )));
        }
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        Ok(state)
    }
}

fn ack(id: Option<String>) -> WriteAck {
    WriteAck { id, message: None }
}

fn missing(what: &str, id: &str) -> ClientError {
    ClientError::Rejected(format!("{what} {id} not found"))
}

fn sample_task(kind: TaskKind, sample: &SampleTask, id: String) -> Task {
    let today = Utc::now();
    Task {
        id,
        kind,
        name: sample.name.to_string(),
        description: sample.description.to_string(),
        status: if sample.completed {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        },
        priority: sample.priority,
        due_at: sample
            .due_in_days
            .map(|days| crate::parser::day_start((today + Duration::days(days)).date_naive())),
        assigned_to: Some(sample.assignee.to_string()),
        assigned_by: match kind {
            TaskKind::Todo => None,
            _ => Some("1".to_string()),
        },
        project_id: None,
    }
}

fn seed(state: &mut State) {
    for sample in SAMPLE_ACCOUNTS {
        state.accounts.push(Account {
            employee: Employee {
                id: sample.id.to_string(),
                name: sample.name.to_string(),
                job_title: sample.job_title.to_string(),
                role: sample.role,
                skills: sample.skills.iter().map(|s| s.to_string()).collect(),
            },
            password: SAMPLE_PASSWORD.to_string(),
        });
    }
    state.next_id = 100;

    for sample in SAMPLE_TODOS {
        let id = state.allocate_id();
        let todo = sample_task(TaskKind::Todo, sample, id);
        state.todos.push((sample.assignee.to_string(), todo));
    }
    for sample in SAMPLE_TASKS {
        let id = state.allocate_id();
        state
            .tasks
            .push(sample_task(TaskKind::Individual, sample, id));
    }

    let project_id = state.allocate_id();
    for sample in SAMPLE_PROJECT_TASKS {
        let id = state.allocate_id();
        let mut task = sample_task(TaskKind::Project, sample, id);
        task.project_id = Some(project_id.clone());
        task.assigned_by = Some("2".to_string());
        state.project_tasks.push(task);
    }
    state.projects.push(Project {
        id: project_id,
        name: "Helpdesk revamp".to_string(),
        description: "Replace the ticket spreadsheet with a web tool".to_string(),
        team_leader_id: Some("2".to_string()),
        employee_ids: vec!["3".to_string(), "4".to_string()],
        priority: Priority::High,
        deadline: Some(crate::parser::day_start(
            (Utc::now() + Duration::days(30)).date_naive(),
        )),
        tasks: Vec::new(),
        completed: false,
        binned: false,
        progress: 0,
    });
    let archived = state.allocate_id();
    state.projects.push(Project {
        id: archived,
        name: "Legacy intranet cleanup".to_string(),
        description: "Retired in favour of the wiki".to_string(),
        team_leader_id: Some("2".to_string()),
        employee_ids: vec!["4".to_string()],
        priority: Priority::Low,
        deadline: None,
        tasks: Vec::new(),
        completed: false,
        binned: true,
        progress: 0,
    });

    let topic_id = state.allocate_id();
    state.topics.push(Topic {
        id: topic_id.clone(),
        title: "Staging deploys".to_string(),
        description: "How do we schedule deploys to staging?".to_string(),
        technical: true,
        created_by: "3".to_string(),
        created_at: Some(Utc::now() - Duration::days(2)),
    });
    let post_id = state.allocate_id();
    state.posts.push(Post {
        id: post_id,
        topic_id,
        content: "Book a slot in the team calendar first.".to_string(),
        user_id: "2".to_string(),
        created_at: Some(Utc::now() - Duration::days(1)),
    });
    let social = state.allocate_id();
    state.topics.push(Topic {
        id: social,
        title: "Friday lunch".to_string(),
        description: "Ideas for the team lunch".to_string(),
        technical: false,
        created_by: "4".to_string(),
        created_at: Some(Utc::now() - Duration::hours(5)),
    });
}

fn with_tasks(project: &Project, tasks: &[Task]) -> Project {
    let mut project = project.clone();
    project.tasks = tasks
        .iter()
        .filter(|task| task.project_id.as_deref() == Some(project.id.as_str()))
        .cloned()
        .collect();
    project.progress = project.computed_progress();
    project
}

fn replace<T>(rows: &mut [T], matches: impl Fn(&T) -> bool, value: T) -> bool {
    match rows.iter_mut().find(|row| matches(row)) {
        Some(row) => {
            *row = value;
            true
        }
        None => false,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn account(&self, update: &ProfileUpdate) -> ClientResult<AccountReply> {
        let mut state = self.enter("navbar")?;
        let Some(account) = state
            .accounts
            .iter_mut()
            .find(|account| account.employee.id == update.user_id)
        else {
            return Ok(AccountReply {
                success: false,
                message: Some("User not found".to_string()),
                role: None,
                name: None,
            });
        };
        if account.password != update.current_password {
            return Ok(AccountReply {
                success: false,
                message: Some("Current password is incorrect".to_string()),
                role: None,
                name: None,
            });
        }
        if let Some(password) = &update.new_password {
            account.password = password.clone();
        }
        if let Some(name) = &update.name {
            account.employee.name = name.clone();
        }
        Ok(AccountReply {
            success: true,
            message: None,
            role: Some(account.employee.role),
            name: Some(account.employee.name.clone()),
        })
    }

    async fn list_todos(&self, user_id: &str) -> ClientResult<Vec<Task>> {
        let state = self.enter("todos")?;
        Ok(state
            .todos
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, todo)| todo.clone())
            .collect())
    }

    async fn create_todo(&self, user_id: &str, todo: &Task) -> ClientResult<WriteAck> {
        let mut state = self.enter("todos")?;
        let id = state.allocate_id();
        let mut stored = todo.clone();
        stored.id = id.clone();
        state.todos.push((user_id.to_string(), stored));
        Ok(ack(Some(id)))
    }

    async fn update_todo(&self, user_id: &str, todo: &Task) -> ClientResult<WriteAck> {
        let mut state = self.enter("todos")?;
        let owner = user_id.to_string();
        let found = replace(
            &mut state.todos,
            |(row_owner, row)| row_owner == &owner && row.id == todo.id,
            (owner.clone(), todo.clone()),
        );
        if !found {
            return Err(missing("todo", &todo.id));
        }
        Ok(ack(None))
    }

    async fn delete_todo(&self, user_id: &str, todo_id: &str) -> ClientResult<WriteAck> {
        let mut state = self.enter("todos")?;
        let before = state.todos.len();
        state
            .todos
            .retain(|(owner, row)| !(owner == user_id && row.id == todo_id));
        if state.todos.len() == before {
            return Err(missing("todo", todo_id));
        }
        Ok(ack(None))
    }

    async fn list_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>> {
        let state = self.enter("tasks")?;
        let role = state
            .accounts
            .iter()
            .find(|account| account.employee.id == user_id)
            .map(|account| account.employee.role);
        Ok(state
            .tasks
            .iter()
            .filter(|task| {
                role == Some(Role::Manager)
                    || task.assigned_to.as_deref() == Some(user_id)
                    || task.assigned_by.as_deref() == Some(user_id)
            })
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: &Task) -> ClientResult<WriteAck> {
        let mut state = self.enter("tasks")?;
        let id = state.allocate_id();
        let mut stored = task.clone();
        stored.id = id.clone();
        state.tasks.push(stored);
        Ok(ack(Some(id)))
    }

    async fn update_task(&self, task: &Task) -> ClientResult<WriteAck> {
        let mut state = self.enter("tasks")?;
        if !replace(&mut state.tasks, |row| row.id == task.id, task.clone()) {
            return Err(missing("task", &task.id));
        }
        Ok(ack(None))
    }

    async fn delete_task(&self, task_id: &str) -> ClientResult<WriteAck> {
        let mut state = self.enter("tasks")?;
        let before = state.tasks.len();
        state.tasks.retain(|row| row.id != task_id);
        if state.tasks.len() == before {
            return Err(missing("task", task_id));
        }
        Ok(ack(None))
    }

    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        let state = self.enter("projects")?;
        Ok(state
            .projects
            .iter()
            .map(|project| with_tasks(project, &state.project_tasks))
            .collect())
    }

    async fn project_tasks(&self, project_id: &str) -> ClientResult<Vec<Task>> {
        let state = self.enter("projects")?;
        Ok(state
            .project_tasks
            .iter()
            .filter(|task| task.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }

    async fn team_leader(&self, project_id: &str) -> ClientResult<Option<Employee>> {
        let state = self.enter("projects")?;
        let leader = state
            .projects
            .iter()
            .find(|project| project.id == project_id)
            .and_then(|project| project.team_leader_id.clone());
        Ok(leader.and_then(|leader| {
            state
                .accounts
                .iter()
                .find(|account| account.employee.id == leader)
                .map(|account| account.employee.clone())
        }))
    }

    async fn create_project(&self, project: &Project) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        let id = state.allocate_id();
        let mut stored = project.clone();
        stored.id = id.clone();
        stored.tasks.clear();
        state.projects.push(stored);
        Ok(ack(Some(id)))
    }

    async fn update_project(&self, project: &Project) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        let mut stored = project.clone();
        stored.tasks.clear();
        if !replace(&mut state.projects, |row| row.id == project.id, stored) {
            return Err(missing("project", &project.id));
        }
        Ok(ack(None))
    }

    async fn update_project_field(
        &self,
        project_id: &str,
        field: &str,
        value: Value,
    ) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        let project = state
            .projects
            .iter_mut()
            .find(|project| project.id == project_id)
            .ok_or_else(|| missing("project", project_id))?;
        match field {
            "binned" => project.binned = loose_bool(&value).unwrap_or(false),
            "completed" => project.completed = loose_status(&value).is_completed(),
            "priority" => project.priority = loose_priority(&value),
            "name" | "project_name" => {
                project.name = value.as_str().unwrap_or_default().to_string()
            }
            other => {
                return Err(ClientError::Rejected(format!(
                    "unknown project field '{other}'"
                )))
            }
        }
        Ok(ack(None))
    }

    async fn delete_project(&self, project_id: &str) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        let before = state.projects.len();
        state.projects.retain(|row| row.id != project_id);
        if state.projects.len() == before {
            return Err(missing("project", project_id));
        }
        state
            .project_tasks
            .retain(|task| task.project_id.as_deref() != Some(project_id));
        Ok(ack(None))
    }

    async fn create_project_task(&self, task: &Task) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        let id = state.allocate_id();
        let mut stored = task.clone();
        stored.id = id.clone();
        state.project_tasks.push(stored);
        Ok(ack(Some(id)))
    }

    async fn update_project_task(&self, task: &Task) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        if !replace(
            &mut state.project_tasks,
            |row| row.id == task.id,
            task.clone(),
        ) {
            return Err(missing("task", &task.id));
        }
        Ok(ack(None))
    }

    async fn delete_project_task(&self, task_id: &str) -> ClientResult<WriteAck> {
        let mut state = self.enter("projects")?;
        let before = state.project_tasks.len();
        state.project_tasks.retain(|row| row.id != task_id);
        if state.project_tasks.len() == before {
            return Err(missing("task", task_id));
        }
        Ok(ack(None))
    }

    async fn list_topics(&self, query: &TopicQuery) -> ClientResult<Vec<Topic>> {
        let state = self.enter("forum")?;
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        Ok(state
            .topics
            .iter()
            .filter(|topic| query.technical.map_or(true, |t| topic.technical == t))
            .filter(|topic| match &needle {
                Some(needle) => {
                    topic.title.to_lowercase().contains(needle.as_str())
                        || topic.description.to_lowercase().contains(needle.as_str())
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn create_topic(&self, topic: &Topic) -> ClientResult<WriteAck> {
        let mut state = self.enter("forum")?;
        let id = state.allocate_id();
        let mut stored = topic.clone();
        stored.id = id.clone();
        stored.created_at.get_or_insert_with(Utc::now);
        state.topics.push(stored);
        Ok(ack(Some(id)))
    }

    async fn delete_topic(&self, topic_id: &str) -> ClientResult<WriteAck> {
        let mut state = self.enter("forum")?;
        let before = state.topics.len();
        state.topics.retain(|row| row.id != topic_id);
        if state.topics.len() == before {
            return Err(missing("topic", topic_id));
        }
        state.posts.retain(|post| post.topic_id != topic_id);
        Ok(ack(None))
    }

    async fn list_posts(&self, topic_id: &str) -> ClientResult<Vec<Post>> {
        let state = self.enter("forum")?;
        Ok(state
            .posts
            .iter()
            .filter(|post| post.topic_id == topic_id)
            .cloned()
            .collect())
    }

    async fn create_post(&self, post: &Post) -> ClientResult<WriteAck> {
        let mut state = self.enter("forum")?;
        if !state.topics.iter().any(|topic| topic.id == post.topic_id) {
            return Err(missing("topic", &post.topic_id));
        }
        let id = state.allocate_id();
        let mut stored = post.clone();
        stored.id = id.clone();
        stored.created_at.get_or_insert_with(Utc::now);
        state.posts.push(stored);
        Ok(ack(Some(id)))
    }

    async fn update_post(&self, post: &Post) -> ClientResult<WriteAck> {
        let mut state = self.enter("forum")?;
        let row = state
            .posts
            .iter_mut()
            .find(|row| row.id == post.id)
            .ok_or_else(|| missing("post", &post.id))?;
        row.content = post.content.clone();
        Ok(ack(None))
    }

    async fn delete_post(&self, post_id: &str) -> ClientResult<WriteAck> {
        let mut state = self.enter("forum")?;
        let before = state.posts.len();
        state.posts.retain(|row| row.id != post_id);
        if state.posts.len() == before {
            return Err(missing("post", post_id));
        }
        Ok(ack(None))
    }

    async fn list_employees(&self) -> ClientResult<Vec<Employee>> {
        let state = self.enter("employees")?;
        Ok(state
            .accounts
            .iter()
            .map(|account| account.employee.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn sample_data_covers_every_collection() {
        let backend = MemoryBackend::with_sample_data();

        assert_eq!(backend.list_todos("3").await.unwrap().len(), 2);
        assert_eq!(backend.list_employees().await.unwrap().len(), 4);
        let projects = backend.list_projects().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].tasks.len(), 2);
        assert_eq!(projects[0].progress, 50);
        assert!(projects[1].binned);
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn fail_next_affects_exactly_one_request() {
        let backend = MemoryBackend::with_sample_data();
        backend.fail_next(ClientError::Status {
            status: 500,
            body: None,
        });

        assert!(backend.list_todos("3").await.is_err());
        assert!(backend.list_todos("3").await.is_ok());
    }

    #[tokio::test]
    async fn account_checks_current_password() {
        let backend = MemoryBackend::with_sample_data();

        let wrong = backend
            .account(&ProfileUpdate::verify("1", "nope"))
            .await
            .unwrap();
        assert!(!wrong.success);

        let right = backend
            .account(&ProfileUpdate::verify("1", SAMPLE_PASSWORD))
            .await
            .unwrap();
        assert!(right.success);
        assert_eq!(right.role, Some(Role::Manager));
    }

    #[tokio::test]
    async fn managers_see_every_individual_task() {
        let backend = MemoryBackend::with_sample_data();

        assert_eq!(backend.list_tasks("1").await.unwrap().len(), 3);
        assert_eq!(backend.list_tasks("4").await.unwrap().len(), 2);
    }
}
