use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Backend, ProfileUpdate, TopicQuery};
use crate::error::{ClientError, ClientResult};
use crate::model::{Employee, Post, Project, Task, Topic};
use crate::normalize::{self, AccountReply, WriteAck};
use crate::parser::format_server_date;

const MAX_ERROR_BODY: usize = 512;

/// Talks to the PHP backend over plain HTTP with JSON and form bodies.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%method, url = url.as_str(), "backend request");
        self.client.request(method, url)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<Value> {
        read_body(self.request(Method::GET, path).query(query).send().await?).await
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> ClientResult<WriteAck> {
        let response = self
            .request(method, path)
            .query(query)
            .json(body)
            .send()
            .await?;
        normalize::write_ack(read_body(response).await?)
    }

    async fn send_form(&self, process: &str, form: &[(&str, String)]) -> ClientResult<WriteAck> {
        let response = self
            .request(Method::POST, "forum")
            .query(&[("process", process)])
            .form(form)
            .send()
            .await?;
        normalize::write_ack(read_body(response).await?)
    }

    async fn projects_action(&self, action: &str, body: &Value) -> ClientResult<WriteAck> {
        self.send_json(Method::POST, "projects", &[("action", action)], body)
            .await
    }
}

async fn read_body(response: Response) -> ClientResult<Value> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "backend returned an error status");
        let body = (!text.trim().is_empty()).then(|| truncate(&text));
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn optional_date(task: &Task) -> Value {
    task.due_at
        .as_ref()
        .map(|due| Value::String(format_server_date(due)))
        .unwrap_or(Value::Null)
}

fn server_id(id: &str) -> Value {
    if id.is_empty() || crate::dispatch::is_provisional(id) {
        Value::Null
    } else {
        Value::String(id.to_string())
    }
}

pub(crate) fn todo_body(user_id: &str, todo: &Task) -> Value {
    json!({
        "todo_id": server_id(&todo.id),
        "user_id": user_id,
        "title": todo.name,
        "description": todo.description,
        "status": todo.status.as_str(),
        "priority": todo.priority.label(),
        "due_date": optional_date(todo),
    })
}

pub(crate) fn task_body(task: &Task) -> Value {
    json!({
        "task_id": server_id(&task.id),
        "task_name": task.name,
        "description": task.description,
        "status": task.status.as_str(),
        "priority": task.priority.label(),
        "due_date": optional_date(task),
        "assigned_to": task.assigned_to,
        "assigned_by": task.assigned_by,
    })
}

pub(crate) fn project_task_body(task: &Task) -> Value {
    let mut body = task_body(task);
    body["project_id"] = json!(task.project_id);
    body
}

pub(crate) fn project_body(project: &Project) -> Value {
    json!({
        "project_id": server_id(&project.id),
        "project_name": project.name,
        "description": project.description,
        "team_leader_id": project.team_leader_id,
        "employee_ids": project.employee_ids,
        "priority": project.priority.label(),
        "deadline": project.deadline.as_ref().map(format_server_date),
        "completed": project.completed,
        "binned": project.binned,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn account(&self, update: &ProfileUpdate) -> ClientResult<AccountReply> {
        let body = serde_json::to_value(update)?;
        let response = self
            .request(Method::POST, "navbar")
            .json(&body)
            .send()
            .await?;
        normalize::account_reply(read_body(response).await?)
    }

    async fn list_todos(&self, user_id: &str) -> ClientResult<Vec<Task>> {
        normalize::todos(self.get("todos", &[("user_id", user_id)]).await?)
    }

    async fn create_todo(&self, user_id: &str, todo: &Task) -> ClientResult<WriteAck> {
        self.send_json(Method::POST, "todos", &[], &todo_body(user_id, todo))
            .await
    }

    async fn update_todo(&self, user_id: &str, todo: &Task) -> ClientResult<WriteAck> {
        self.send_json(Method::PUT, "todos", &[], &todo_body(user_id, todo))
            .await
    }

    async fn delete_todo(&self, user_id: &str, todo_id: &str) -> ClientResult<WriteAck> {
        let body = json!({ "todo_id": todo_id, "user_id": user_id });
        self.send_json(Method::DELETE, "todos", &[], &body).await
    }

    async fn list_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>> {
        normalize::individual_tasks(self.get("tasks", &[("user_id", user_id)]).await?)
    }

    async fn create_task(&self, task: &Task) -> ClientResult<WriteAck> {
        self.send_json(Method::POST, "tasks", &[], &task_body(task))
            .await
    }

    async fn update_task(&self, task: &Task) -> ClientResult<WriteAck> {
        self.send_json(Method::PUT, "tasks", &[], &task_body(task))
            .await
    }

    async fn delete_task(&self, task_id: &str) -> ClientResult<WriteAck> {
        self.send_json(Method::DELETE, "tasks", &[], &json!({ "task_id": task_id }))
            .await
    }

    async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        normalize::projects(self.get("projects", &[("action", "getProjects")]).await?)
    }

    async fn project_tasks(&self, project_id: &str) -> ClientResult<Vec<Task>> {
        let body = self
            .get(
                "projects",
                &[("action", "getTasks"), ("project_id", project_id)],
            )
            .await?;
        normalize::project_tasks(body, project_id)
    }

    async fn team_leader(&self, project_id: &str) -> ClientResult<Option<Employee>> {
        let body = self
            .get(
                "projects",
                &[("action", "getTeamLeader"), ("project_id", project_id)],
            )
            .await?;
        normalize::single_employee(body)
    }

    async fn create_project(&self, project: &Project) -> ClientResult<WriteAck> {
        self.projects_action("createProject", &project_body(project))
            .await
    }

    async fn update_project(&self, project: &Project) -> ClientResult<WriteAck> {
        self.projects_action("updateProject", &project_body(project))
            .await
    }

    async fn update_project_field(
        &self,
        project_id: &str,
        field: &str,
        value: Value,
    ) -> ClientResult<WriteAck> {
        let body = json!({ "project_id": project_id, "field": field, "value": value });
        self.projects_action("updateProjectField", &body).await
    }

    async fn delete_project(&self, project_id: &str) -> ClientResult<WriteAck> {
        self.projects_action("deleteProject", &json!({ "project_id": project_id }))
            .await
    }

    async fn create_project_task(&self, task: &Task) -> ClientResult<WriteAck> {
        self.projects_action("createTask", &project_task_body(task))
            .await
    }

    async fn update_project_task(&self, task: &Task) -> ClientResult<WriteAck> {
        self.projects_action("updateTask", &project_task_body(task))
            .await
    }

    async fn delete_project_task(&self, task_id: &str) -> ClientResult<WriteAck> {
        self.projects_action("deleteTask", &json!({ "task_id": task_id }))
            .await
    }

    async fn list_topics(&self, query: &TopicQuery) -> ClientResult<Vec<Topic>> {
        let mut params = vec![("process", "getTopics")];
        if let Some(technical) = query.technical {
            params.push(("technical", if technical { "1" } else { "0" }));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("search", search));
        }
        normalize::topics(self.get("forum", &params).await?)
    }

    async fn create_topic(&self, topic: &Topic) -> ClientResult<WriteAck> {
        let form = [
            ("title", topic.title.clone()),
            ("description", topic.description.clone()),
            ("technical", if topic.technical { "1" } else { "0" }.to_string()),
            ("user_id", topic.created_by.clone()),
        ];
        self.send_form("createTopic", &form).await
    }

    async fn delete_topic(&self, topic_id: &str) -> ClientResult<WriteAck> {
        self.send_form("deleteTopic", &[("topic_id", topic_id.to_string())])
            .await
    }

    async fn list_posts(&self, topic_id: &str) -> ClientResult<Vec<Post>> {
        let body = self
            .get("forum", &[("process", "getPosts"), ("topic_id", topic_id)])
            .await?;
        normalize::posts(body, topic_id)
    }

    async fn create_post(&self, post: &Post) -> ClientResult<WriteAck> {
        let form = [
            ("topic_id", post.topic_id.clone()),
            ("content", post.content.clone()),
            ("user_id", post.user_id.clone()),
        ];
        self.send_form("createPost", &form).await
    }

    async fn update_post(&self, post: &Post) -> ClientResult<WriteAck> {
        let form = [
            ("post_id", post.id.clone()),
            ("content", post.content.clone()),
            ("user_id", post.user_id.clone()),
        ];
        self.send_form("updatePost", &form).await
    }

    async fn delete_post(&self, post_id: &str) -> ClientResult<WriteAck> {
        self.send_form("deletePost", &[("post_id", post_id.to_string())])
            .await
    }

    async fn list_employees(&self) -> ClientResult<Vec<Employee>> {
        normalize::employees(self.get("employees", &[]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskKind, TaskStatus};
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer it with `status`/`body` and hand back the raw request.
    async fn serve_once(status: u16, body: &'static str) -> (HttpBackend, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        let backend =
            HttpBackend::new(&format!("http://{addr}/api/"), Duration::from_secs(5)).unwrap();
        (backend, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&buffer).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let lower = line.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|value| value.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buffer.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buffer).to_string()
    }

    fn todo() -> Task {
        Task {
            id: String::new(),
            kind: TaskKind::Todo,
            name: "Write report".into(),
            description: "Quarterly numbers".into(),
            status: TaskStatus::Pending,
            priority: Priority::High,
            due_at: None,
            assigned_to: None,
            assigned_by: None,
            project_id: None,
        }
    }

    #[tokio::test]
    async fn lists_todos_with_user_query() {
        let (backend, server) = serve_once(
            200,
            r#"[{"todo_id":"4","title":"Write report","status":"0","priority":"high"}]"#,
        )
        .await;

        let todos = backend.list_todos("12").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /api/todos?user_id=12 "));
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].id, "4");
        assert_eq!(todos[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn create_todo_posts_json_and_reads_id() {
        let (backend, server) = serve_once(200, r#"{"success":true,"todo_id":31}"#).await;

        let ack = backend.create_todo("12", &todo()).await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(ack.id.as_deref(), Some("31"));
        assert!(request.starts_with("POST /api/todos "));
        assert!(request.contains(r#""title":"Write report""#));
        assert!(request.contains(r#""todo_id":null"#));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let (backend, server) = serve_once(500, r#"{"error":"db down"}"#).await;

        let err = backend.list_projects().await.unwrap_err();
        server.await.unwrap();

        assert_eq!(
            err,
            ClientError::Status {
                status: 500,
                body: Some(r#"{"error":"db down"}"#.into())
            }
        );
    }

    #[tokio::test]
    async fn success_false_is_a_rejection() {
        let (backend, server) =
            serve_once(200, r#"{"success":"0","message":"Not allowed"}"#).await;

        let err = backend.delete_task("9").await.unwrap_err();
        server.await.unwrap();

        assert_eq!(err, ClientError::Rejected("Not allowed".into()));
    }

    #[tokio::test]
    async fn malformed_json_is_a_payload_error() {
        let (backend, server) = serve_once(200, "<html>oops</html>").await;

        let err = backend.list_employees().await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, ClientError::Payload(_)));
    }

    #[tokio::test]
    async fn forum_writes_are_form_encoded() {
        let (backend, server) = serve_once(200, r#"{"success":true,"post_id":"5"}"#).await;
        let post = Post {
            id: String::new(),
            topic_id: "2".into(),
            content: "Use the staging box".into(),
            user_id: "12".into(),
            created_at: None,
        };

        backend.create_post(&post).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /api/forum?process=createPost "));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.contains("content=Use+the+staging+box"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = HttpBackend::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();

        let err = backend.list_todos("1").await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn project_task_body_carries_project_and_assignee() {
        let mut task = todo();
        task.kind = TaskKind::Project;
        task.id = "local-01HZ".into();
        task.assigned_to = Some("7".into());
        task.project_id = Some("3".into());

        let body = project_task_body(&task);

        assert_eq!(body["task_id"], Value::Null);
        assert_eq!(body["assigned_to"], json!("7"));
        assert_eq!(body["project_id"], json!("3"));
        assert_eq!(body["priority"], json!("High"));
    }
}
