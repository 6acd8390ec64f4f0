//! Optimistic mutation pipeline shared by every collection.
//!
//! A mutation is validated, applied locally, sent to the remote and then
//! reconciled by re-fetching the whole collection. A failed request rolls the
//! workspace back to the state it had before the mutation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::error::{ClientError, ClientResult, ValidationError};
use crate::model::{Entity, Trackable, ViewCriteria};
use crate::recycle::{Bin, BinEntry};
use crate::store::{Collection, LoadOutcome, LoadState, Notice};
use crate::telemetry::{self, Event};
use crate::view;

pub const PROVISIONAL_PREFIX: &str = "local-";

pub fn provisional_id() -> String {
    format!("{PROVISIONAL_PREFIX}{}", Ulid::new())
}

pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

/// Server side of one collection.
#[async_trait]
pub trait Remote<T: Entity>: Send + Sync {
    fn collection(&self) -> &'static str;

    async fn fetch(&self) -> ClientResult<Vec<T>>;

    /// Returns the id assigned by the server when it reports one.
    async fn create(&self, item: &T) -> ClientResult<Option<String>>;

    async fn update(&self, item: &T) -> ClientResult<()>;

    async fn delete(&self, item: &T) -> ClientResult<()>;

    /// Whether the server records the binned flag itself. When it does, soft
    /// delete and restore are sent through `bin`/`unbin`; otherwise the bin
    /// stays local and only a permanent delete reaches the server.
    fn persists_bin(&self) -> bool {
        false
    }

    async fn bin(&self, _item: &T) -> ClientResult<()> {
        Err(ClientError::Unsupported {
            collection: self.collection(),
            action: "bin",
        })
    }

    async fn unbin(&self, _item: &T) -> ClientResult<()> {
        Err(ClientError::Unsupported {
            collection: self.collection(),
            action: "restore",
        })
    }

    fn validate(&self, _item: &T) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    Create(T),
    Update(T),
    ToggleStatus(String),
    Delete(String),
    Restore(String),
    PermanentDelete(String),
}

impl<T: Entity> Mutation<T> {
    pub fn action(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "create",
            Mutation::Update(_) => "update",
            Mutation::ToggleStatus(_) => "toggle",
            Mutation::Delete(_) => "delete",
            Mutation::Restore(_) => "restore",
            Mutation::PermanentDelete(_) => "permanent delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub action: &'static str,
    pub id: String,
    /// False when the post-mutation re-fetch failed or was not needed.
    pub reconciled: bool,
}

/// Active items plus the recycle bin of one collection.
#[derive(Debug, Clone)]
pub struct Workspace<T> {
    pub active: Collection<T>,
    pub bin: Bin<T>,
}

impl<T: Entity> Workspace<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            active: Collection::new(name),
            bin: Bin::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot<T> {
    pub collection: &'static str,
    pub items: Vec<T>,
    pub bin: Vec<BinEntry<T>>,
    pub state: LoadState,
    pub notice: Option<Notice>,
    pub version: u64,
    pub last_refreshed: Option<DateTime<Utc>>,
}

enum Call<T> {
    Local,
    Create(T),
    Update(T),
    Delete(T),
    Bin(T),
    Unbin(T),
}

/// Inverse of one staged mutation, applied alone when its remote call fails so
/// that concurrent mutations keep their effect.
enum Undo<T> {
    Remove(String),
    Replace(T),
    Unbin(String),
    Rebin(BinEntry<T>),
}

pub struct Dispatcher<T: Entity, R: Remote<T>> {
    remote: Arc<R>,
    state: Arc<Mutex<Workspace<T>>>,
    telemetry: Arc<telemetry::Handle>,
}

impl<T: Entity, R: Remote<T>> Clone for Dispatcher<T, R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            state: Arc::clone(&self.state),
            telemetry: Arc::clone(&self.telemetry),
        }
    }
}

impl<T: Entity, R: Remote<T>> Dispatcher<T, R> {
    pub fn new(remote: R, telemetry: Arc<telemetry::Handle>) -> Self {
        let name = remote.collection();
        Self {
            remote: Arc::new(remote),
            state: Arc::new(Mutex::new(Workspace::new(name))),
            telemetry,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn collection(&self) -> &'static str {
        self.remote.collection()
    }

    pub fn with_workspace<O>(&self, read: impl FnOnce(&Workspace<T>) -> O) -> O {
        read(&self.state.lock())
    }

    pub fn items(&self) -> Vec<T> {
        self.state.lock().active.items().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.state.lock().active.get(id).cloned()
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot<T> {
        let ws = self.state.lock();
        WorkspaceSnapshot {
            collection: ws.active.name(),
            items: ws.active.items().to_vec(),
            bin: ws.bin.entries().to_vec(),
            state: ws.active.state().clone(),
            notice: ws.active.notice().cloned(),
            version: ws.active.version(),
            last_refreshed: ws.active.last_refreshed(),
        }
    }

    pub fn view(&self, criteria: &ViewCriteria) -> Vec<T>
    where
        T: Trackable,
    {
        let ws = self.state.lock();
        view::derive_view(ws.active.items(), criteria)
    }

    pub fn close(&self) {
        self.state.lock().active.close();
    }

    /// Fetch the whole collection and reconcile it with the local bin.
    pub async fn refresh(&self) -> LoadOutcome {
        let collection = self.collection();
        let ticket = self.state.lock().active.begin_load();
        self.telemetry.record(Event::RefreshRequested(collection));

        let result = self.remote.fetch().await;

        let outcome = {
            let mut ws = self.state.lock();
            if !ws.active.is_current(ticket) {
                LoadOutcome::Discarded
            } else {
                let result = result.map(|fetched| self.reconcile(&mut ws, fetched));
                ws.active.finish_load(ticket, result)
            }
        };

        match &outcome {
            LoadOutcome::Applied(count) => {
                debug!(collection, count, "collection refreshed");
                self.telemetry.record(Event::RefreshCompleted {
                    collection,
                    count: *count,
                });
            }
            LoadOutcome::Failed(err) => self.telemetry.record(Event::RefreshFailed {
                collection,
                error: err.to_string(),
            }),
            LoadOutcome::Discarded => {
                debug!(collection, "discarding superseded fetch result");
                self.telemetry.record(Event::RefreshDiscarded(collection));
            }
        }
        outcome
    }

    /// Split a fetch result between the active list and the bin; returns the active part.
    fn reconcile(&self, ws: &mut Workspace<T>, fetched: Vec<T>) -> Vec<T> {
        if self.remote.persists_bin() {
            let binned: HashSet<String> = fetched
                .iter()
                .filter(|item| item.is_binned())
                .map(|item| item.id().to_string())
                .collect();
            ws.bin.retain(|entry| binned.contains(entry.item.id()));
            let now = Utc::now();
            let mut active = Vec::with_capacity(fetched.len());
            for item in fetched {
                if item.is_binned() {
                    let origin = active.len();
                    ws.bin.stash(item, origin, now);
                } else {
                    active.push(item);
                }
            }
            active
        } else {
            let known: HashSet<&str> = fetched.iter().map(Entity::id).collect();
            ws.bin.retain(|entry| known.contains(entry.item.id()));
            ws.bin.refresh_from(&fetched);
            fetched
                .into_iter()
                .filter(|item| !ws.bin.contains(item.id()))
                .collect()
        }
    }

    /// Apply `mutation` optimistically, send it and reconcile with the server.
    pub async fn submit(&self, mutation: Mutation<T>) -> ClientResult<MutationOutcome> {
        let collection = self.collection();
        let action = mutation.action();

        let (call, id, undo) = {
            let mut ws = self.state.lock();
            match self.stage(&mut ws, mutation) {
                Ok(staged) => staged,
                Err(err) => {
                    ws.active
                        .set_notice(Notice::error(format!("Cannot {action}: {err}")));
                    return Err(err);
                }
            }
        };

        let sent = match &call {
            Call::Local => Ok(None),
            Call::Create(item) => self.remote.create(item).await,
            Call::Update(item) => self.remote.update(item).await.map(|_| None),
            Call::Delete(item) => self.remote.delete(item).await.map(|_| None),
            Call::Bin(item) => self.remote.bin(item).await.map(|_| None),
            Call::Unbin(item) => self.remote.unbin(item).await.map(|_| None),
        };

        let assigned = match sent {
            Ok(assigned) => assigned,
            Err(err) => {
                warn!(collection, action, error = %err, "mutation failed, rolling back");
                {
                    let mut ws = self.state.lock();
                    Self::rollback(&mut ws, undo);
                    ws.active.set_notice(Notice::error(format!(
                        "Failed to {action} {}: {err}",
                        singular(collection)
                    )));
                }
                self.telemetry.record(Event::MutationFailed {
                    collection,
                    action,
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        let id = match assigned {
            Some(server_id) if !server_id.is_empty() && server_id != id => {
                let mut ws = self.state.lock();
                ws.active.patch(|items| {
                    if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
                        item.set_id(server_id.clone());
                    }
                });
                server_id
            }
            _ => id,
        };

        info!(collection, action, id = id.as_str(), "mutation applied");
        self.telemetry
            .record(Event::MutationApplied { collection, action });
        self.state.lock().active.set_notice(Notice::info(format!(
            "{} {}",
            capitalize(singular(collection)),
            past_tense(action)
        )));

        let reconciled = match call {
            Call::Local => false,
            _ => matches!(self.refresh().await, LoadOutcome::Applied(_)),
        };

        Ok(MutationOutcome {
            action,
            id,
            reconciled,
        })
    }

    /// Reverse one failed mutation. Loads already in flight stay current, since
    /// the server never saw the change.
    fn rollback(ws: &mut Workspace<T>, undo: Undo<T>) {
        let Workspace { active, bin } = ws;
        active.revert(|items| match undo {
            Undo::Remove(id) => items.retain(|item| item.id() != id),
            Undo::Replace(previous) => {
                if let Some(item) = items.iter_mut().find(|item| item.id() == previous.id()) {
                    *item = previous;
                }
            }
            Undo::Unbin(id) => {
                bin.restore(items, &id);
            }
            Undo::Rebin(entry) => {
                items.retain(|item| item.id() != entry.item.id());
                bin.stash(entry.item, entry.origin, entry.deleted_at);
            }
        });
    }

    /// Validate and apply the local half of a mutation; returns the remote call
    /// to make and how to take the local half back.
    fn stage(
        &self,
        ws: &mut Workspace<T>,
        mutation: Mutation<T>,
    ) -> ClientResult<(Call<T>, String, Undo<T>)> {
        let collection = self.collection();
        let not_found = |id: &str| ClientError::NotFound {
            collection,
            id: id.to_string(),
        };

        match mutation {
            Mutation::Create(mut item) => {
                self.remote.validate(&item)?;
                if item.id().trim().is_empty() {
                    item.set_id(provisional_id());
                }
                let id = item.id().to_string();
                let local = item.clone();
                ws.active.patch(|items| items.push(local));
                Ok((Call::Create(item), id.clone(), Undo::Remove(id)))
            }
            Mutation::Update(item) => {
                let id = item.id().to_string();
                let position = ws.active.position(&id).ok_or_else(|| not_found(&id))?;
                self.remote.validate(&item)?;
                let previous = ws.active.items()[position].clone();
                let local = item.clone();
                ws.active.patch(|items| items[position] = local);
                Ok((Call::Update(item), id, Undo::Replace(previous)))
            }
            Mutation::ToggleStatus(id) => {
                let position = ws.active.position(&id).ok_or_else(|| not_found(&id))?;
                let previous = ws.active.items()[position].clone();
                let mut item = previous.clone();
                if !item.toggle_status() {
                    return Err(ValidationError::NotToggleable(collection).into());
                }
                let local = item.clone();
                ws.active.patch(|items| items[position] = local);
                Ok((Call::Update(item), id, Undo::Replace(previous)))
            }
            Mutation::Delete(id) => {
                if ws.active.position(&id).is_none() {
                    return Err(not_found(&id));
                }
                let bin = &mut ws.bin;
                let mut moved = None;
                ws.active.patch(|items| {
                    moved = bin.soft_delete(items, &id).map(|entry| entry.item.clone());
                });
                let mut item = moved.ok_or_else(|| not_found(&id))?;
                let undo = Undo::Unbin(id.clone());
                if self.remote.persists_bin() {
                    item.set_binned(true);
                    Ok((Call::Bin(item), id, undo))
                } else {
                    Ok((Call::Local, id, undo))
                }
            }
            Mutation::Restore(id) => {
                let entry = ws.bin.get(&id).cloned().ok_or_else(|| not_found(&id))?;
                let bin = &mut ws.bin;
                let mut restored = None;
                ws.active.patch(|items| {
                    restored = bin.restore(items, &id);
                    if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
                        item.set_binned(false);
                    }
                });
                let mut item = restored.ok_or_else(|| not_found(&id))?;
                let undo = Undo::Rebin(entry);
                if self.remote.persists_bin() {
                    item.set_binned(false);
                    Ok((Call::Unbin(item), id, undo))
                } else {
                    Ok((Call::Local, id, undo))
                }
            }
            Mutation::PermanentDelete(id) => {
                let entry = ws.bin.purge(&id).ok_or_else(|| not_found(&id))?;
                if is_provisional(&id) {
                    return Ok((Call::Local, id, Undo::Rebin(entry)));
                }
                Ok((Call::Delete(entry.item.clone()), id, Undo::Rebin(entry)))
            }
        }
    }
}

fn singular(collection: &str) -> &str {
    collection.strip_suffix('s').unwrap_or(collection)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn past_tense(action: &str) -> &'static str {
    match action {
        "create" => "created",
        "update" => "updated",
        "toggle" => "toggled",
        "delete" => "moved to bin",
        "restore" => "restored",
        _ => "deleted permanently",
    }
}
