//! In-memory user and task store
//!
//! Used when no database URL is configured and by the test suites. Data lives
//! for the life of the process.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::{
    CoreError, Credential, NewCredential, NewTask, Result, Task, TaskSort, TaskStore, UserStore,
};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, Credential>,
    tasks: BTreeMap<i64, Task>,
    next_user_id: i64,
    next_task_id: i64,
}

/// Process-local store backed by ordered maps
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<Credential>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn save_user(&self, credential: NewCredential) -> Result<Credential> {
        // Check and insert under one write lock so concurrent registrations
        // of the same name cannot both succeed.
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|user| user.username == credential.username)
        {
            return Err(CoreError::AlreadyExists(credential.username));
        }

        inner.next_user_id += 1;
        let user = Credential {
            id: inner.next_user_id,
            username: credential.username,
            password_hash: credential.password_hash,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn list_by_owner(&self, user_id: i64, sort: TaskSort) -> Result<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|task| task.is_owned_by(user_id))
            .cloned()
            .collect();

        // Byte order on titles, ties by id
        if sort == TaskSort::Title {
            tasks.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        }
        Ok(tasks)
    }

    async fn list_by_owner_and_completed(
        &self,
        user_id: i64,
        completed: bool,
    ) -> Result<Vec<Task>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .values()
            .filter(|task| task.is_owned_by(user_id) && task.completed == completed)
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.inner.read().await.tasks.get(&id).cloned())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let mut inner = self.inner.write().await;
        inner.next_task_id += 1;

        let now = Utc::now();
        let task = Task {
            id: inner.next_task_id,
            title: task.title,
            description: task.description,
            completed: task.completed,
            user_id: task.user_id,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: &Task) -> Result<Task> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| CoreError::NotFound(format!("task {}", task.id)))?;

        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.completed = task.completed;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        self.inner
            .write()
            .await
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str, user_id: i64, completed: bool) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            completed,
            user_id,
        }
    }

    #[tokio::test]
    async fn test_save_and_find_user() {
        let store = InMemoryStore::new();
        let saved = store
            .save_user(NewCredential {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let found = store.find_user_by_username("alice").await.unwrap();
        assert_eq!(found, Some(saved));
    }

    #[tokio::test]
    async fn test_username_lookup_is_case_sensitive() {
        let store = InMemoryStore::new();
        store
            .save_user(NewCredential {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        assert!(store.find_user_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = InMemoryStore::new();
        let first = store
            .save_user(NewCredential {
                username: "alice".to_string(),
                password_hash: "first".to_string(),
            })
            .await
            .unwrap();

        let result = store
            .save_user(NewCredential {
                username: "alice".to_string(),
                password_hash: "second".to_string(),
            })
            .await;
        assert!(matches!(result, Err(CoreError::AlreadyExists(_))));

        let stored = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, first.password_hash);
    }

    #[tokio::test]
    async fn test_list_tasks_by_owner_and_sort() {
        let store = InMemoryStore::new();
        store.create_task(new_task("b task", 1, false)).await.unwrap();
        store.create_task(new_task("a task", 1, true)).await.unwrap();
        store.create_task(new_task("other", 2, false)).await.unwrap();

        let by_id = store.list_by_owner(1, TaskSort::Id).await.unwrap();
        let titles: Vec<_> = by_id.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["b task", "a task"]);

        let by_title = store.list_by_owner(1, TaskSort::Title).await.unwrap();
        let titles: Vec<_> = by_title.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a task", "b task"]);

        let done = store.list_by_owner_and_completed(1, true).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].title, "a task");
    }

    #[tokio::test]
    async fn test_title_sort_is_byte_order() {
        let store = InMemoryStore::new();
        for title in ["b", "a", "B", "_x"] {
            store.create_task(new_task(title, 1, false)).await.unwrap();
        }

        let tasks = store.list_by_owner(1, TaskSort::Title).await.unwrap();
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "_x", "a", "b"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_task() {
        let store = InMemoryStore::new();
        let mut task = store.create_task(new_task("draft", 1, false)).await.unwrap();

        task.title = "final".to_string();
        task.completed = true;
        let updated = store.update_task(&task).await.unwrap();
        assert_eq!(updated.title, "final");
        assert!(updated.completed);

        store.delete_task(task.id).await.unwrap();
        assert!(store.get_task(task.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_task(task.id).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
