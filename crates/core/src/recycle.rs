//! Session-scoped recycle bin for soft-deleted items.
//!
//! The bin only lives as long as the process: nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Entity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinEntry<T> {
    pub item: T,
    pub deleted_at: DateTime<Utc>,
    /// Position the item held in the active collection when it was binned.
    #[serde(skip)]
    pub(crate) origin: usize,
}

#[derive(Debug, Clone)]
pub struct Bin<T> {
    entries: Vec<BinEntry<T>>,
}

impl<T> Default for Bin<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Entity> Bin<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BinEntry<T>] {
        &self.entries
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.item.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&BinEntry<T>> {
        self.entries.iter().find(|entry| entry.item.id() == id)
    }

    /// Move the item with `id` out of `active` into the bin.
    pub fn soft_delete(&mut self, active: &mut Vec<T>, id: &str) -> Option<&BinEntry<T>> {
        let position = active.iter().position(|item| item.id() == id)?;
        let item = active.remove(position);
        self.stash(item, position, Utc::now());
        self.entries.last()
    }

    /// Put an item straight into the bin, e.g. one the server reports as binned.
    pub fn stash(&mut self, item: T, origin: usize, deleted_at: DateTime<Utc>) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|entry| entry.item.id() == item.id())
        {
            existing.item = item;
            return;
        }
        self.entries.push(BinEntry {
            item,
            deleted_at,
            origin,
        });
    }

    /// Move the item with `id` back into `active`, at its old position when possible.
    pub fn restore(&mut self, active: &mut Vec<T>, id: &str) -> Option<T> {
        let entry = self.take(id)?;
        let position = entry.origin.min(active.len());
        active.insert(position, entry.item.clone());
        Some(entry.item)
    }

    /// Drop the item with `id` for good.
    pub fn purge(&mut self, id: &str) -> Option<BinEntry<T>> {
        self.take(id)
    }

    /// Refresh binned copies with newer server data without un-binning them.
    pub fn refresh_from(&mut self, fetched: &[T]) {
        for entry in &mut self.entries {
            if let Some(newer) = fetched.iter().find(|item| item.id() == entry.item.id()) {
                entry.item = newer.clone();
            }
        }
    }

    pub fn retain(&mut self, keep: impl Fn(&BinEntry<T>) -> bool) {
        self.entries.retain(|entry| keep(entry));
    }

    fn take(&mut self, id: &str) -> Option<BinEntry<T>> {
        let position = self.entries.iter().position(|entry| entry.item.id() == id)?;
        Some(self.entries.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Task, TaskKind, TaskStatus};
    use pretty_assertions::assert_eq;

    fn todo(id: &str) -> Task {
        Task {
            id: id.into(),
            kind: TaskKind::Todo,
            name: format!("todo {id}"),
            description: "details".into(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            due_at: None,
            assigned_to: None,
            assigned_by: None,
            project_id: None,
        }
    }

    #[test]
    fn restore_undoes_soft_delete() {
        let original = vec![todo("1"), todo("2"), todo("3")];
        let mut active = original.clone();
        let mut bin = Bin::new();

        let entry = bin.soft_delete(&mut active, "2").expect("binned");
        assert_eq!(entry.item.id, "2");
        assert_eq!(active.len(), 2);
        assert!(bin.contains("2"));

        let restored = bin.restore(&mut active, "2").expect("restored");
        assert_eq!(restored, todo("2"));
        assert_eq!(active, original);
        assert!(bin.is_empty());
    }

    #[test]
    fn purged_items_cannot_be_restored() {
        let mut active = vec![todo("1"), todo("2")];
        let mut bin = Bin::new();
        bin.soft_delete(&mut active, "1");

        assert!(bin.purge("1").is_some());
        assert!(bin.restore(&mut active, "1").is_none());
        assert_eq!(active, vec![todo("2")]);
    }

    #[test]
    fn soft_delete_of_unknown_id_is_a_no_op() {
        let mut active = vec![todo("1")];
        let mut bin: Bin<Task> = Bin::new();
        assert!(bin.soft_delete(&mut active, "9").is_none());
        assert_eq!(active.len(), 1);
        assert!(bin.is_empty());
    }

    #[test]
    fn restore_clamps_to_shrunk_collection() {
        let mut active = vec![todo("1"), todo("2"), todo("3")];
        let mut bin = Bin::new();
        bin.soft_delete(&mut active, "3");
        active.clear();

        bin.restore(&mut active, "3");
        assert_eq!(active, vec![todo("3")]);
    }
}
