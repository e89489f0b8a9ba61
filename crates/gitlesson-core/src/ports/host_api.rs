//! HostApi port - the remote source-control host.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{RepoId, UserId};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The repository has no commits yet.
    #[error("repository is empty")]
    EmptyRepository,

    #[error("host returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// How a host call authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A user's OAuth access token.
    Token(String),
    /// The application's client credentials.
    App {
        client_id: String,
        client_secret: String,
    },
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Credentials::Token(token.into())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Credentials::Token(..)"),
            Credentials::App { client_id, .. } => f
                .debug_struct("Credentials::App")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub id: UserId,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub id: RepoId,
    pub name: String,
    pub full_name: String,
    pub owner: RemoteAccount,
    pub language: Option<String>,
    pub default_branch: Option<String>,
    /// Size in KiB as reported by the host; zero for an empty repository.
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommit {
    pub sha: String,
    pub message: String,
    pub committer_id: Option<UserId>,
    pub parents: Vec<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHook {
    pub id: u64,
    /// Delivery target from the hook's config, if it has one.
    pub url: Option<String>,
}

/// A push-event webhook to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHook {
    pub url: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    pub per_page: u32,
    pub since: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait HostApi: Send + Sync {
    /// Repositories owned by the authenticated user.
    async fn list_user_repos(&self, creds: &Credentials) -> Result<Vec<RemoteRepo>, HostError>;

    /// Organizations `login` is a public member of.
    async fn list_user_orgs(
        &self,
        creds: &Credentials,
        login: &str,
    ) -> Result<Vec<RemoteAccount>, HostError>;

    async fn list_org_repos(
        &self,
        creds: &Credentials,
        org: &str,
    ) -> Result<Vec<RemoteRepo>, HostError>;

    async fn get_repo(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
    ) -> Result<RemoteRepo, HostError>;

    /// One page of recent commits. Fails with [`HostError::EmptyRepository`]
    /// when the repository has none.
    async fn list_commits(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
    ) -> Result<Vec<RemoteCommit>, HostError>;

    async fn get_commit(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<RemoteCommit, HostError>;

    /// Every webhook on the repository, across all pages.
    async fn list_hooks(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RemoteHook>, HostError>;

    async fn create_hook(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        hook: &NewHook,
    ) -> Result<RemoteHook, HostError>;

    async fn delete_hook(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        hook_id: u64,
    ) -> Result<(), HostError>;

    /// Render markdown to HTML; `context` is the `owner/repo` used for references.
    async fn render_markdown(
        &self,
        creds: &Credentials,
        text: &str,
        context: &str,
    ) -> Result<String, HostError>;
}
