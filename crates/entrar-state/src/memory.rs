use std::{collections::HashMap, sync::RwLock};

use serde_json::Value;

use crate::repository::{Repository, RepositoryError, RepositoryItem};

/// A [`Repository`] backed by process memory. Contents do not survive the
/// process, which makes this the backend for session-scoped state. Items are
/// stored serialized, so the backend behaves like a persistent one would.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl<V: RepositoryItem> Repository<V> for MemoryRepository {
    async fn get(&self, key: String) -> Result<Option<V>, RepositoryError> {
        self.items
            .read()
            .expect("RwLock should not be poisoned")
            .get(&key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Into::into)
    }

    async fn list(&self) -> Result<Vec<V>, RepositoryError> {
        self.items
            .read()
            .expect("RwLock should not be poisoned")
            .values()
            .map(|value| serde_json::from_value(value.clone()))
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn set(&self, key: String, value: V) -> Result<(), RepositoryError> {
        let serialized = serde_json::to_value(&value)?;
        self.items
            .write()
            .expect("RwLock should not be poisoned")
            .insert(key, serialized);
        Ok(())
    }

    async fn remove(&self, key: String) -> Result<(), RepositoryError> {
        self.items
            .write()
            .expect("RwLock should not be poisoned")
            .remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::register_repository_item;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestItem {
        value: String,
    }
    register_repository_item!(TestItem, "TestItem");

    fn item(value: &str) -> TestItem {
        TestItem {
            value: value.into(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn get_before_set_is_absent() {
        let repo = MemoryRepository::new();
        let read: Option<TestItem> = repo.get("missing".into()).await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn set_then_get_round_trips() {
        let repo = MemoryRepository::new();
        repo.set("a".into(), item("one")).await.unwrap();

        let read: Option<TestItem> = repo.get("a".into()).await.unwrap();
        assert_eq!(read, Some(item("one")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn set_overwrites_existing_key() {
        let repo = MemoryRepository::new();
        repo.set("a".into(), item("one")).await.unwrap();
        repo.set("a".into(), item("two")).await.unwrap();

        let read: Option<TestItem> = repo.get("a".into()).await.unwrap();
        assert_eq!(read, Some(item("two")));

        let all: Vec<TestItem> = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remove_makes_key_absent() {
        let repo = MemoryRepository::new();
        repo.set("a".into(), item("one")).await.unwrap();
        Repository::<TestItem>::remove(&repo, "a".into()).await.unwrap();

        let read: Option<TestItem> = repo.get("a".into()).await.unwrap();
        assert_eq!(read, None);
    }
}
