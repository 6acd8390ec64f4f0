use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

/// Items partitioned by key. Groups keep the order in which their key was
/// first seen and items keep their input order; empty groups never exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Groups<K, T> {
    groups: Vec<Group<K, T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

impl<K, T> Groups<K, T> {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group<K, T>> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.iter().map(|group| &group.key)
    }

    pub fn get(&self, key: &K) -> Option<&[T]>
    where
        K: PartialEq,
    {
        self.groups
            .iter()
            .find(|group| &group.key == key)
            .map(|group| group.items.as_slice())
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|group| group.items.len()).sum()
    }
}

impl<K, T> IntoIterator for Groups<K, T> {
    type Item = Group<K, T>;
    type IntoIter = std::vec::IntoIter<Group<K, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

pub fn group_by<K, T, F>(items: &[T], key_fn: F) -> Groups<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Group<K, T>> = Vec::new();
    for item in items {
        let key = key_fn(item);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                key,
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].items.push(item.clone());
    }
    Groups { groups }
}
