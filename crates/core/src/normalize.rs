//! The single boundary where loosely typed backend JSON becomes canonical model values.
//!
//! The backend sends booleans as `"1"`/`"0"`, ids as numbers or strings, priorities in
//! any casing and dates in several shapes. Everything past this module only sees the
//! typed values from [`crate::model`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ClientError, ClientResult};
use crate::model::{Employee, Post, Priority, Project, Role, Task, TaskKind, TaskStatus, Topic};
use crate::parser::parse_server_date;

type Record = Map<String, Value>;

/// Reply to a write request: the id the server assigned, if it reported one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteAck {
    pub id: Option<String>,
    pub message: Option<String>,
}

/// Reply from the account endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReply {
    pub success: bool,
    pub message: Option<String>,
    pub role: Option<Role>,
    pub name: Option<String>,
}

pub fn todos(body: Value) -> ClientResult<Vec<Task>> {
    collect(body, &["todos", "data"], |record| {
        task(record, TaskKind::Todo, &["todo_id", "id"], &["assigned_to"])
    })
}

pub fn individual_tasks(body: Value) -> ClientResult<Vec<Task>> {
    collect(body, &["tasks", "data"], |record| {
        task(
            record,
            TaskKind::Individual,
            &["task_id", "id"],
            &["assigned_to", "assignedTo", "employee_id"],
        )
    })
}

pub fn project_tasks(body: Value, project_id: &str) -> ClientResult<Vec<Task>> {
    collect(body, &["tasks", "data"], |record| {
        let mut task = task(
            record,
            TaskKind::Project,
            &["task_id", "id"],
            &["assigned_to", "assignedTo", "employee_id", "user_id"],
        )?;
        if task.project_id.is_none() {
            task.project_id = Some(project_id.to_string());
        }
        Some(task)
    })
}

pub fn projects(body: Value) -> ClientResult<Vec<Project>> {
    collect(body, &["projects", "data"], project)
}

pub fn topics(body: Value) -> ClientResult<Vec<Topic>> {
    collect(body, &["topics", "data"], topic)
}

pub fn posts(body: Value, topic_id: &str) -> ClientResult<Vec<Post>> {
    collect(body, &["posts", "data"], |record| post(record, topic_id))
}

pub fn employees(body: Value) -> ClientResult<Vec<Employee>> {
    collect(body, &["employees", "users", "data"], employee)
}

/// A single optional employee, e.g. a project's team leader.
pub fn single_employee(body: Value) -> ClientResult<Option<Employee>> {
    match body {
        Value::Null => Ok(None),
        Value::Array(_) => Ok(employees(body)?.into_iter().next()),
        Value::Object(ref map) if map.contains_key("success") && !is_success(map) => {
            Err(rejection(map))
        }
        Value::Object(map) => {
            if let Some(inner) = field(&map, &["team_leader", "teamLeader", "data"]) {
                return single_employee(inner.clone());
            }
            Ok(employee(&map))
        }
        other => Err(ClientError::Payload(format!(
            "expected an employee object, got {}",
            kind_of(&other)
        ))),
    }
}

pub fn write_ack(body: Value) -> ClientResult<WriteAck> {
    match body {
        Value::Object(map) => {
            if !is_success(&map) {
                return Err(rejection(&map));
            }
            Ok(WriteAck {
                id: id_field(
                    &map,
                    &["id", "todo_id", "task_id", "project_id", "topic_id", "post_id"],
                ),
                message: text_field(&map, &["message"]),
            })
        }
        Value::Null => Ok(WriteAck::default()),
        Value::Bool(true) => Ok(WriteAck::default()),
        other => Err(ClientError::Payload(format!(
            "expected a status object, got {}",
            kind_of(&other)
        ))),
    }
}

pub fn account_reply(body: Value) -> ClientResult<AccountReply> {
    let Value::Object(map) = body else {
        return Err(ClientError::Payload(format!(
            "expected an account reply object, got {}",
            kind_of(&body)
        )));
    };
    Ok(AccountReply {
        success: field(&map, &["success"]).and_then(loose_bool).unwrap_or(false),
        message: text_field(&map, &["message", "error"]),
        role: text_field(&map, &["role", "userRole", "user_role"]).and_then(|r| r.parse().ok()),
        name: text_field(&map, &["name", "userName"]),
    })
}

fn collect<T>(
    body: Value,
    wrappers: &[&str],
    convert: impl Fn(&Record) -> Option<T>,
) -> ClientResult<Vec<T>> {
    let records = match body {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(map) => {
            if map.contains_key("success") && !is_success(&map) {
                return Err(rejection(&map));
            }
            match field(&map, wrappers) {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Null) | None if map.contains_key("success") => Vec::new(),
                _ => {
                    return Err(ClientError::Payload(format!(
                        "expected a list under one of {:?}",
                        wrappers
                    )))
                }
            }
        }
        other => {
            return Err(ClientError::Payload(format!(
                "expected a list, got {}",
                kind_of(&other)
            )))
        }
    };

    let mut result = Vec::with_capacity(records.len());
    for value in records {
        match value {
            Value::Object(record) => match convert(&record) {
                Some(item) => result.push(item),
                None => warn!(?record, "skipping record without an id"),
            },
            other => warn!(kind = kind_of(&other), "skipping non-object record"),
        }
    }
    Ok(result)
}

fn task(
    record: &Record,
    kind: TaskKind,
    id_keys: &[&str],
    assignee_keys: &[&str],
) -> Option<Task> {
    Some(Task {
        id: id_field(record, id_keys)?,
        kind,
        name: text_field(record, &["title", "task_name", "name", "todo_name"]).unwrap_or_default(),
        description: text_field(record, &["description", "task_description", "details"])
            .unwrap_or_default(),
        status: field(record, &["status", "completed", "is_completed"])
            .map(loose_status)
            .unwrap_or(TaskStatus::Pending),
        priority: field(record, &["priority"])
            .map(loose_priority)
            .unwrap_or_default(),
        due_at: field(record, &["due_date", "dueDate", "deadline", "due"]).and_then(loose_date),
        assigned_to: id_field(record, assignee_keys),
        assigned_by: id_field(record, &["assigned_by", "assignedBy", "manager_id"]),
        project_id: id_field(record, &["project_id", "projectId"]),
    })
}

fn project(record: &Record) -> Option<Project> {
    let id = id_field(record, &["project_id", "id"])?;
    let tasks = match field(record, &["tasks"]) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| {
                task(
                    item,
                    TaskKind::Project,
                    &["task_id", "id"],
                    &["assigned_to", "assignedTo", "employee_id", "user_id"],
                )
            })
            .map(|mut task| {
                task.project_id.get_or_insert_with(|| id.clone());
                task
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut project = Project {
        id,
        name: text_field(record, &["project_name", "name", "title"]).unwrap_or_default(),
        description: text_field(record, &["description", "project_description"])
            .unwrap_or_default(),
        team_leader_id: id_field(record, &["team_leader_id", "teamLeaderId", "team_leader"]),
        employee_ids: field(record, &["employee_ids", "employeeIds", "employees"])
            .map(id_list)
            .unwrap_or_default(),
        priority: field(record, &["priority"])
            .map(loose_priority)
            .unwrap_or_default(),
        deadline: field(record, &["deadline", "due_date", "dueDate"]).and_then(loose_date),
        tasks,
        completed: field(record, &["completed", "is_completed", "status"])
            .map(|value| loose_status(value).is_completed())
            .unwrap_or(false),
        binned: field(record, &["binned", "is_binned", "in_bin"])
            .and_then(loose_bool)
            .unwrap_or(false),
        progress: 0,
    };
    project.progress = field(record, &["progress"])
        .and_then(loose_percent)
        .unwrap_or_else(|| project.computed_progress());
    Some(project)
}

fn topic(record: &Record) -> Option<Topic> {
    Some(Topic {
        id: id_field(record, &["topic_id", "id"])?,
        title: text_field(record, &["title", "topic_title", "name"]).unwrap_or_default(),
        description: text_field(record, &["description", "topic_description"]).unwrap_or_default(),
        technical: field(record, &["technical", "is_technical"])
            .and_then(loose_bool)
            .unwrap_or(false),
        created_by: id_field(record, &["created_by", "createdBy", "user_id"]).unwrap_or_default(),
        created_at: field(record, &["created_at", "createdAt", "date"]).and_then(loose_date),
    })
}

fn post(record: &Record, topic_id: &str) -> Option<Post> {
    Some(Post {
        id: id_field(record, &["post_id", "id"])?,
        topic_id: id_field(record, &["topic_id", "topicId"]).unwrap_or_else(|| topic_id.to_string()),
        content: text_field(record, &["content", "post_content", "body"]).unwrap_or_default(),
        user_id: id_field(record, &["user_id", "userId", "created_by"]).unwrap_or_default(),
        created_at: field(record, &["created_at", "createdAt", "date"]).and_then(loose_date),
    })
}

fn employee(record: &Record) -> Option<Employee> {
    let name = text_field(record, &["name", "full_name", "fullName"]).or_else(|| {
        let first = text_field(record, &["first_name", "firstName"]);
        let last = text_field(record, &["last_name", "lastName"]);
        match (first, last) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (first, last) => first.or(last),
        }
    });
    Some(Employee {
        id: id_field(record, &["user_id", "employee_id", "id"])?,
        name: name.unwrap_or_default(),
        job_title: text_field(record, &["job_title", "jobTitle", "position"]).unwrap_or_default(),
        role: text_field(record, &["role", "user_role", "userRole"])
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(Role::Employee),
        skills: field(record, &["skills"]).map(text_list).unwrap_or_default(),
    })
}

fn field<'a>(record: &'a Record, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(record: &Record, keys: &[&str]) -> Option<String> {
    field(record, keys).and_then(loose_text)
}

fn id_field(record: &Record, keys: &[&str]) -> Option<String> {
    text_field(record, keys).filter(|id| !id.is_empty())
}

fn is_success(record: &Record) -> bool {
    match record.get("success") {
        Some(value) => loose_bool(value).unwrap_or(false),
        None => !record.contains_key("error"),
    }
}

fn rejection(record: &Record) -> ClientError {
    ClientError::Rejected(
        text_field(record, &["message", "error"]).unwrap_or_else(|| "request failed".to_string()),
    )
}

pub(crate) fn loose_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub(crate) fn loose_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Some(true),
            "0" | "false" | "no" | "n" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn loose_status(value: &Value) -> TaskStatus {
    if let Value::String(text) = value {
        if let Ok(status) = text.parse::<TaskStatus>() {
            return status;
        }
    }
    match loose_bool(value) {
        Some(true) => TaskStatus::Completed,
        _ => TaskStatus::Pending,
    }
}

pub(crate) fn loose_priority(value: &Value) -> Priority {
    let parsed = match value {
        Value::String(text) => text.parse::<Priority>().ok(),
        Value::Number(number) => match number.as_i64() {
            Some(n) if n <= 1 => Some(Priority::Low),
            Some(2) => Some(Priority::Medium),
            Some(_) => Some(Priority::High),
            None => None,
        },
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(%value, "unknown priority, defaulting to medium");
        Priority::default()
    })
}

fn loose_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_server_date(text),
        _ => None,
    }
}

fn loose_percent(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_nan() {
        return None;
    }
    Some(number.clamp(0.0, 100.0) as u8)
}

fn id_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(record) => id_field(record, &["user_id", "employee_id", "id"]),
                other => loose_text(other),
            })
            .filter(|id| !id.is_empty())
            .collect(),
        other => text_list(other),
    }
}

fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(loose_text)
            .filter(|item| !item.is_empty())
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Number(number) => vec![number.to_string()],
        _ => Vec::new(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
