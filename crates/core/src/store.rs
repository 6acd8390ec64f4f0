use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::ClientError;
use crate::model::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    Idle,
    Loading,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Error,
}

/// User-visible message describing the outcome of the last load or mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Info,
            created_at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, NoticeKind::Error)
    }
}

/// Proof that a load was started against a particular generation of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied(usize),
    Failed(ClientError),
    /// A newer load, a local patch or `close` superseded this result.
    Discarded,
}

/// Ordered in-memory collection backing one view.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    name: &'static str,
    items: Vec<T>,
    state: LoadState,
    notice: Option<Notice>,
    generation: u64,
    version: u64,
    last_refreshed: Option<DateTime<Utc>>,
    closed: bool,
}

impl<T: Entity> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Vec::new(),
            state: LoadState::Idle,
            notice: None,
            generation: 0,
            version: 0,
            last_refreshed: None,
            closed: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation = self.generation.wrapping_add(1);
        if !self.closed {
            self.state = LoadState::Loading;
        }
        LoadTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        !self.closed && ticket.generation == self.generation
    }

    /// Apply a fetch result. Errors keep the last good items; stale tickets change nothing.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<T>, ClientError>,
    ) -> LoadOutcome {
        if !self.is_current(ticket) {
            return LoadOutcome::Discarded;
        }

        match result {
            Ok(items) => {
                let count = items.len();
                self.items = items;
                self.state = LoadState::Idle;
                self.version = self.version.wrapping_add(1);
                self.last_refreshed = Some(Utc::now());
                if self.notice.as_ref().is_some_and(Notice::is_error) {
                    self.notice = None;
                }
                LoadOutcome::Applied(count)
            }
            Err(err) => {
                warn!(collection = self.name, error = %err, "load failed, keeping last good items");
                self.state = LoadState::Error(err.to_string());
                self.notice = Some(Notice::error(format!(
                    "Could not load {}: {}",
                    self.name, err
                )));
                LoadOutcome::Failed(err)
            }
        }
    }

    /// Replace the items locally and invalidate any load still in flight.
    pub fn patch(&mut self, update: impl FnOnce(&mut Vec<T>)) {
        update(&mut self.items);
        self.generation = self.generation.wrapping_add(1);
        self.version = self.version.wrapping_add(1);
        if matches!(self.state, LoadState::Loading) {
            self.state = LoadState::Idle;
        }
    }

    /// Take back a local change the server never accepted. Unlike [`patch`],
    /// loads already in flight stay current.
    ///
    /// [`patch`]: Collection::patch
    pub fn revert(&mut self, update: impl FnOnce(&mut Vec<T>)) {
        update(&mut self.items);
        self.version = self.version.wrapping_add(1);
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Detach from the view: results of in-flight loads are dropped from now on.
    pub fn close(&mut self) {
        self.closed = true;
        self.generation = self.generation.wrapping_add(1);
        self.state = LoadState::Idle;
    }
}
