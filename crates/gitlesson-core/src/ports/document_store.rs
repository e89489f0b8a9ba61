//! DocumentStore port - users, hooks and lessons.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Hook, Lesson, LessonId, RepoId, User, UserId};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("a hook is already registered for {0}")]
    DuplicateHook(RepoId),

    #[error("document backend: {0}")]
    Backend(String),

    #[error("stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("document store lock poisoned")]
    Poisoned,
}

/// Sort/skip/limit window for lesson listings (newest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonQuery {
    pub skip: usize,
    pub limit: usize,
}

impl Default for LessonQuery {
    fn default() -> Self {
        Self { skip: 0, limit: 25 }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, DocumentError>;

    /// Insert or replace by id. Returns `true` when the user did not exist.
    async fn upsert_user(&self, user: User) -> Result<bool, DocumentError>;

    async fn find_hook(&self, repo_id: RepoId) -> Result<Option<Hook>, DocumentError>;

    /// The subset of `repo_ids` that already have a hook.
    async fn hooked_repos(&self, repo_ids: &[RepoId]) -> Result<HashSet<RepoId>, DocumentError>;

    async fn all_hooks(&self) -> Result<Vec<Hook>, DocumentError>;

    /// Fails with [`DocumentError::DuplicateHook`] if the repository already has one.
    async fn insert_hook(&self, hook: Hook) -> Result<(), DocumentError>;

    async fn delete_hook(&self, repo_id: RepoId) -> Result<bool, DocumentError>;

    async fn insert_lesson(&self, lesson: Lesson) -> Result<(), DocumentError>;

    async fn find_lesson(&self, id: LessonId) -> Result<Option<Lesson>, DocumentError>;

    async fn lesson_exists(&self, repo_id: RepoId, commit_id: &str) -> Result<bool, DocumentError>;

    /// Delete every lesson of `repo_id` whose parent commit is `parent_commit_id`.
    async fn delete_lessons_by_parent(
        &self,
        repo_id: RepoId,
        parent_commit_id: &str,
    ) -> Result<usize, DocumentError>;

    async fn latest_lessons(&self, query: LessonQuery) -> Result<Vec<Lesson>, DocumentError>;
}
