//! In-memory stores for tests and ephemeral runs.
//!
//! Both stores keep everything behind one `std::sync::Mutex`. No lock is ever
//! held across an `.await`, so every operation is atomic on its own.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{Hook, Lesson, LessonId, RepoId, User, UserId};
use crate::ports::{DocumentError, DocumentStore, LessonQuery, ListStore, StoreError};

#[derive(Default)]
struct ListState {
    lists: HashMap<String, VecDeque<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// `ListStore` over `HashMap<String, VecDeque<String>>` plus string hashes.
#[derive(Default)]
pub struct InMemoryListStore {
    state: Mutex<ListState>,
}

impl InMemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ListState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Copy of a list, head first.
    pub fn list_contents(&self, list: &str) -> Vec<String> {
        self.lock()
            .map(|s| s.lists.get(list).map(|l| l.iter().cloned().collect()).unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn push_tail(&self, list: &str, value: String) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        let queue = state.lists.entry(list.to_string()).or_default();
        queue.push_back(value);
        Ok(queue.len())
    }

    async fn pop_head(&self, list: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.lock()?;
        Ok(state.lists.get_mut(list).and_then(VecDeque::pop_front))
    }

    async fn length(&self, list: &str) -> Result<usize, StoreError> {
        let state = self.lock()?;
        Ok(state.lists.get(list).map_or(0, VecDeque::len))
    }

    async fn hash_set(&self, hash: &str, field: &str, value: String) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .hashes
            .entry(hash.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_get(&self, hash: &str, field: &str) -> Result<Option<String>, StoreError> {
        let state = self.lock()?;
        Ok(state.hashes.get(hash).and_then(|h| h.get(field)).cloned())
    }

    async fn hash_get_all(&self, hash: &str) -> Result<Vec<(String, String)>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .hashes
            .get(hash)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn hash_delete(&self, hash: &str, field: &str) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        Ok(state
            .hashes
            .get_mut(hash)
            .is_some_and(|h| h.remove(field).is_some()))
    }

    async fn hash_exists(&self, hash: &str, field: &str) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.hashes.get(hash).is_some_and(|h| h.contains_key(field)))
    }
}

#[derive(Default)]
struct Documents {
    users: HashMap<UserId, User>,
    hooks: HashMap<RepoId, Hook>,
    lessons: Vec<Lesson>,
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: Mutex<Documents>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, DocumentError> {
        self.docs.lock().map_err(|_| DocumentError::Poisoned)
    }

    /// Every stored lesson in insertion order.
    pub fn lessons(&self) -> Vec<Lesson> {
        self.lock().map(|d| d.lessons.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, DocumentError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn upsert_user(&self, user: User) -> Result<bool, DocumentError> {
        Ok(self.lock()?.users.insert(user.id, user).is_none())
    }

    async fn find_hook(&self, repo_id: RepoId) -> Result<Option<Hook>, DocumentError> {
        Ok(self.lock()?.hooks.get(&repo_id).cloned())
    }

    async fn hooked_repos(&self, repo_ids: &[RepoId]) -> Result<HashSet<RepoId>, DocumentError> {
        let docs = self.lock()?;
        Ok(repo_ids
            .iter()
            .filter(|id| docs.hooks.contains_key(id))
            .copied()
            .collect())
    }

    async fn all_hooks(&self) -> Result<Vec<Hook>, DocumentError> {
        Ok(self.lock()?.hooks.values().cloned().collect())
    }

    async fn insert_hook(&self, hook: Hook) -> Result<(), DocumentError> {
        let mut docs = self.lock()?;
        if docs.hooks.contains_key(&hook.repo_id) {
            return Err(DocumentError::DuplicateHook(hook.repo_id));
        }
        docs.hooks.insert(hook.repo_id, hook);
        Ok(())
    }

    async fn delete_hook(&self, repo_id: RepoId) -> Result<bool, DocumentError> {
        Ok(self.lock()?.hooks.remove(&repo_id).is_some())
    }

    async fn insert_lesson(&self, lesson: Lesson) -> Result<(), DocumentError> {
        self.lock()?.lessons.push(lesson);
        Ok(())
    }

    async fn find_lesson(&self, id: LessonId) -> Result<Option<Lesson>, DocumentError> {
        Ok(self.lock()?.lessons.iter().find(|l| l.id == id).cloned())
    }

    async fn lesson_exists(&self, repo_id: RepoId, commit_id: &str) -> Result<bool, DocumentError> {
        Ok(self
            .lock()?
            .lessons
            .iter()
            .any(|l| l.repo_id == repo_id && l.commit_id == commit_id))
    }

    async fn delete_lessons_by_parent(
        &self,
        repo_id: RepoId,
        parent_commit_id: &str,
    ) -> Result<usize, DocumentError> {
        let mut docs = self.lock()?;
        let before = docs.lessons.len();
        docs.lessons.retain(|l| {
            !(l.repo_id == repo_id && l.parent_commit_id.as_deref() == Some(parent_commit_id))
        });
        Ok(before - docs.lessons.len())
    }

    async fn latest_lessons(&self, query: LessonQuery) -> Result<Vec<Lesson>, DocumentError> {
        let mut lessons = self.lock()?.lessons.clone();
        lessons.sort_by(|a, b| b.post_date.cmp(&a.post_date));
        Ok(lessons.into_iter().skip(query.skip).take(query.limit).collect())
    }
}
