//! Transport seam between the view-models and the dashboard backend.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientResult;
use crate::model::{Choice, Employee, Post, Project, Task, Topic, TopicCriteria};
use crate::normalize::{AccountReply, WriteAck};

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// Query parameters accepted by the topic listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicQuery {
    pub technical: Option<bool>,
    pub search: Option<String>,
}

impl From<&TopicCriteria> for TopicQuery {
    fn from(criteria: &TopicCriteria) -> Self {
        Self {
            technical: match criteria.technical {
                Choice::All => None,
                Choice::Only(technical) => Some(technical),
            },
            search: criteria
                .search
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
        }
    }
}

/// Account change sent to the navbar endpoint. `current_password` is always required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub user_id: String,
    pub current_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProfileUpdate {
    /// A credential check that changes nothing.
    pub fn verify(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_password: password.into(),
            new_password: None,
            name: None,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn account(&self, update: &ProfileUpdate) -> ClientResult<AccountReply>;

    async fn list_todos(&self, user_id: &str) -> ClientResult<Vec<Task>>;
    async fn create_todo(&self, user_id: &str, todo: &Task) -> ClientResult<WriteAck>;
    async fn update_todo(&self, user_id: &str, todo: &Task) -> ClientResult<WriteAck>;
    async fn delete_todo(&self, user_id: &str, todo_id: &str) -> ClientResult<WriteAck>;

    async fn list_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>>;
    async fn create_task(&self, task: &Task) -> ClientResult<WriteAck>;
    async fn update_task(&self, task: &Task) -> ClientResult<WriteAck>;
    async fn delete_task(&self, task_id: &str) -> ClientResult<WriteAck>;

    async fn list_projects(&self) -> ClientResult<Vec<Project>>;
    async fn project_tasks(&self, project_id: &str) -> ClientResult<Vec<Task>>;
    async fn team_leader(&self, project_id: &str) -> ClientResult<Option<Employee>>;
    async fn create_project(&self, project: &Project) -> ClientResult<WriteAck>;
    async fn update_project(&self, project: &Project) -> ClientResult<WriteAck>;
    async fn update_project_field(
        &self,
        project_id: &str,
        field: &str,
        value: Value,
    ) -> ClientResult<WriteAck>;
    async fn delete_project(&self, project_id: &str) -> ClientResult<WriteAck>;
    async fn create_project_task(&self, task: &Task) -> ClientResult<WriteAck>;
    async fn update_project_task(&self, task: &Task) -> ClientResult<WriteAck>;
    async fn delete_project_task(&self, task_id: &str) -> ClientResult<WriteAck>;

    async fn list_topics(&self, query: &TopicQuery) -> ClientResult<Vec<Topic>>;
    async fn create_topic(&self, topic: &Topic) -> ClientResult<WriteAck>;
    async fn delete_topic(&self, topic_id: &str) -> ClientResult<WriteAck>;
    async fn list_posts(&self, topic_id: &str) -> ClientResult<Vec<Post>>;
    async fn create_post(&self, post: &Post) -> ClientResult<WriteAck>;
    async fn update_post(&self, post: &Post) -> ClientResult<WriteAck>;
    async fn delete_post(&self, post_id: &str) -> ClientResult<WriteAck>;

    async fn list_employees(&self) -> ClientResult<Vec<Employee>>;
}
