use thiserror::Error;

/// Failures raised while talking to the backend or mutating a collection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("server responded with HTTP {status}")]
    Status { status: u16, body: Option<String> },
    #[error("unexpected response payload: {0}")]
    Payload(String),
    #[error("server rejected the request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no {collection} item with id '{id}'")]
    NotFound { collection: &'static str, id: String },
    #[error("{collection} does not support {action}")]
    Unsupported {
        collection: &'static str,
        action: &'static str,
    },
}

impl ClientError {
    /// Whether the failure happened before any request left the client.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_)
                | ClientError::NotFound { .. }
                | ClientError::Unsupported { .. }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ClientError::Status {
                status: status.as_u16(),
                body: None,
            };
        }
        if err.is_decode() {
            return ClientError::Payload(err.to_string());
        }
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Payload(err.to_string())
    }
}

/// Input problems caught before a request is issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("assignee '{assignee}' is not a member of project '{project}'")]
    AssigneeNotInProject { assignee: String, project: String },
    #[error("project task needs exactly one assignee")]
    MissingAssignee,
    #[error("{0} cannot change completion state")]
    NotToggleable(&'static str),
    #[error("role {role} is not allowed to {action}")]
    NotPermitted { role: String, action: &'static str },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
