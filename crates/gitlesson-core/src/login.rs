//! Sign-in: scope check, user upsert and the first repository scan.

use thiserror::Error;
use tracing::{info, warn};

use crate::app::ServiceContext;
use crate::domain::{Task, User, UserId, UserReposTask};
use crate::ports::DocumentError;
use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("missing OAuth scopes: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    #[error("document store: {0}")]
    Documents(#[from] DocumentError),

    #[error("task store: {0}")]
    Queue(#[from] QueueError),
}

/// Profile handed back by the OAuth exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginProfile {
    pub id: UserId,
    pub login: String,
    pub token: String,
    pub avatar_url: Option<String>,
}

/// Required scopes absent from `granted`, a comma-separated scope string.
/// Keeps the order of `required`, without duplicates.
pub fn missing_scopes(required: &[String], granted: &str) -> Vec<String> {
    let granted: Vec<&str> = granted
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let mut missing: Vec<String> = Vec::new();
    for scope in required {
        if !granted.contains(&scope.as_str()) && !missing.contains(scope) {
            missing.push(scope.clone());
        }
    }
    missing
}

/// Record a successful sign-in. Returns whether the user is new; a new user
/// gets a `userRepos` task with `newUser` set.
pub async fn register_login(
    ctx: &ServiceContext,
    profile: LoginProfile,
    granted_scopes: &str,
    required_scopes: &[String],
) -> Result<bool, LoginError> {
    let missing = missing_scopes(required_scopes, granted_scopes);
    if !missing.is_empty() {
        warn!(user_id = %profile.id, missing = ?missing, "login rejected");
        return Err(LoginError::MissingScopes(missing));
    }

    let user = User {
        id: profile.id,
        username: profile.login,
        token: profile.token,
        avatar_url: profile.avatar_url,
    };
    let user_id = user.id;
    let created = ctx.documents.upsert_user(user).await?;
    if created {
        let task: Task = UserReposTask {
            user_id,
            new_user: true,
        }
        .into();
        ctx.tasks.enqueue(&task).await?;
        info!(user_id = %user_id, "new user, repository scan queued");
    }
    Ok(created)
}
