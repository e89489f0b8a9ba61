//! Persisted records: users, registered hooks and lessons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LessonId, RepoId, UserId};

/// A signed-in user. Supplies the host API credentials for their tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// One registered webhook and the secret its deliveries are signed with.
///
/// At most one hook exists per `repo_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub repo_id: RepoId,
    /// Owner of the repository (user or organization).
    pub owner_id: UserId,
    pub owner_name: String,
    pub name: String,
    pub url: String,
    pub secret: String,
    /// User whose credentials provisioned the hook.
    pub linked_user_id: UserId,
    pub add_date: DateTime<Utc>,
}

/// A lesson extracted from a commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub lang: String,
    pub body: String,
    pub rendered_html: String,
    pub repo_id: RepoId,
    pub commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_commit_id: Option<String>,
    pub author: UserId,
    pub post_date: DateTime<Utc>,
}
