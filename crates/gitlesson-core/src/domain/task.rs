use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::UserId;

/// Discriminator of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    UserRepos,
    Hook,
    CommitSearch,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::UserRepos, TaskKind::Hook, TaskKind::CommitSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::UserRepos => "userRepos",
            TaskKind::Hook => "hook",
            TaskKind::CommitSearch => "commitSearch",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discover a user's repositories and queue webhook provisioning for the new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReposTask {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new_user: bool,
}

/// Provision the push webhook on one repository.
///
/// `owner_id` is always the linked user whose credentials are used;
/// `owner_name` is set only when the repository belongs to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookTask {
    pub owner_id: UserId,
    pub repo_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new_user: bool,
}

/// Backfill lessons from a repository's recent commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSearchTask {
    pub owner_name: String,
    pub owner_token: String,
    pub repo_name: String,
}

/// A unit of deferred work.
///
/// The wire shape is an internally tagged JSON object, e.g.
/// `{"type":"userRepos","userId":1,"newUser":true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Task {
    UserRepos(UserReposTask),
    Hook(HookTask),
    CommitSearch(CommitSearchTask),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::UserRepos(_) => TaskKind::UserRepos,
            Task::Hook(_) => TaskKind::Hook,
            Task::CommitSearch(_) => TaskKind::CommitSearch,
        }
    }
}

impl From<UserReposTask> for Task {
    fn from(task: UserReposTask) -> Self {
        Task::UserRepos(task)
    }
}

impl From<HookTask> for Task {
    fn from(task: HookTask) -> Self {
        Task::Hook(task)
    }
}

impl From<CommitSearchTask> for Task {
    fn from(task: CommitSearchTask) -> Self {
        Task::CommitSearch(task)
    }
}
