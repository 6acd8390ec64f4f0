use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "open" | "todo" => Ok(TaskStatus::Pending),
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            other => Err(anyhow!(
                "Unknown status '{}': expected pending|completed",
                other
            )),
        }
    }
}

impl ValueEnum for TaskStatus {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [TaskStatus; 2] = [TaskStatus::Pending, TaskStatus::Completed];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Capitalized label as the backend stores it.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Priority::Low),
            "medium" | "med" | "normal" | "2" => Ok(Priority::Medium),
            "high" | "urgent" | "3" => Ok(Priority::High),
            other => Err(anyhow!(
                "Unknown priority '{}': expected low|medium|high",
                other
            )),
        }
    }
}

impl ValueEnum for Priority {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
    TeamLeader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::TeamLeader => "team_leader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "teamleader" | "tl" => Ok(Role::TeamLeader),
            _ => Err(anyhow!(
                "Unknown role '{}': expected employee|manager|team_leader",
                s.trim()
            )),
        }
    }
}

impl ValueEnum for Role {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [Role; 3] = [Role::Employee, Role::Manager, Role::TeamLeader];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Which endpoint family a [`Task`] belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Todo,
    Individual,
    Project,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Todo => "todo",
            TaskKind::Individual => "individual",
            TaskKind::Project => "project",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_leader_id: Option<String>,
    pub employee_ids: Vec<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub tasks: Vec<Task>,
    pub completed: bool,
    pub binned: bool,
    pub progress: u8,
}

impl Project {
    pub fn state(&self) -> ProjectState {
        if self.binned {
            ProjectState::Binned
        } else if self.completed {
            ProjectState::Completed
        } else {
            ProjectState::Active
        }
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.employee_ids.iter().any(|id| id == user_id)
    }

    /// Progress derived from the loaded tasks, 0 when there are none.
    pub fn computed_progress(&self) -> u8 {
        if self.tasks.is_empty() {
            return 0;
        }
        let done = self
            .tasks
            .iter()
            .filter(|task| task.status.is_completed())
            .count();
        ((done * 100) / self.tasks.len()) as u8
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    Active,
    Completed,
    Binned,
}

impl ProjectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectState::Active => "active",
            ProjectState::Completed => "completed",
            ProjectState::Binned => "binned",
        }
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub technical: bool,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub topic_id: String,
    pub content: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub job_title: String,
    pub role: Role,
    pub skills: Vec<String>,
}

/// Anything the collection store can hold.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn label(&self) -> &str;

    /// Server-side soft delete flag, for entities whose backend persists one.
    fn is_binned(&self) -> bool {
        false
    }

    fn set_binned(&mut self, _binned: bool) {}

    /// Flip the completion state; `false` when the entity has none.
    fn toggle_status(&mut self) -> bool {
        false
    }
}

/// Entities the filter/sort engine understands.
pub trait Trackable: Entity {
    fn status(&self) -> TaskStatus;
    fn priority(&self) -> Priority;
    fn due_at(&self) -> Option<DateTime<Utc>>;
    fn assignee(&self) -> Option<&str>;
    fn description(&self) -> &str;
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn toggle_status(&mut self) -> bool {
        self.status = self.status.toggled();
        true
    }
}

impl Trackable for Task {
    fn status(&self) -> TaskStatus {
        self.status
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    fn assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn is_binned(&self) -> bool {
        self.binned
    }

    fn set_binned(&mut self, binned: bool) {
        self.binned = binned;
    }

    fn toggle_status(&mut self) -> bool {
        self.completed = !self.completed;
        true
    }
}

impl Trackable for Project {
    fn status(&self) -> TaskStatus {
        if self.completed {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        }
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn due_at(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    fn assignee(&self) -> Option<&str> {
        self.team_leader_id.as_deref()
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Entity for Topic {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.title
    }
}

impl Entity for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.content
    }
}

impl Entity for Employee {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// A filter predicate that can be switched off with the `all` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice<T> {
    All,
    Only(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: PartialEq> Choice<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Choice::All => true,
            Choice::Only(expected) => expected == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }
}

impl<T> FromStr for Choice<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Choice::All);
        }
        Ok(Choice::Only(s.parse()?))
    }
}

impl<T: fmt::Display> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::All => write!(f, "all"),
            Choice::Only(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Due,
    Priority,
    Name,
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "due" | "deadline" | "due_date" | "due-date" => Ok(SortField::Due),
            "priority" => Ok(SortField::Priority),
            "name" | "title" => Ok(SortField::Name),
            other => Err(anyhow!(
                "Unknown sort field '{}': expected due|priority|name",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(anyhow!("Unknown sort direction '{}': expected asc|desc", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Filter and sort parameters that decide what subset of a collection is shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewCriteria {
    pub priority: Choice<Priority>,
    pub status: Choice<TaskStatus>,
    pub assignee: Choice<String>,
    pub search: Option<String>,
    pub sort: Option<SortSpec>,
}

impl ViewCriteria {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Choice::Only(status),
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec::new(field, direction));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCriteria {
    pub technical: Choice<bool>,
    pub search: Option<String>,
    pub newest_first: bool,
}

impl Default for TopicCriteria {
    fn default() -> Self {
        Self {
            technical: Choice::All,
            search: None,
            newest_first: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub state: ProjectState,
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub progress: u8,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        let completed = project
            .tasks
            .iter()
            .filter(|task| task.status.is_completed())
            .count();
        Self {
            project: project.name.clone(),
            state: project.state(),
            total: project.tasks.len(),
            completed,
            pending: project.tasks.len() - completed,
            progress: project.progress,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workload {
    pub employee_id: String,
    pub name: Option<String>,
    pub total: usize,
    pub pending: usize,
    pub overdue: usize,
}
