//! Fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::app::{ServiceContext, ServiceSettings};
use crate::domain::{RepoId, User, UserId};
use crate::impls::{InMemoryDocumentStore, InMemoryListStore};
use crate::ports::{
    CommitQuery, Credentials, DocumentStore, FixedClock, HostApi, HostError, NewHook,
    RemoteAccount, RemoteCommit, RemoteHook, RemoteRepo,
};
use crate::queue::{QueueKeys, TaskStore};

pub(crate) const CALLBACK_URL: &str = "https://lessons.test/hook";

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub(crate) fn user(id: u64, login: &str) -> User {
    User {
        id: UserId::new(id),
        username: login.into(),
        token: format!("token-{login}"),
        avatar_url: None,
    }
}

pub(crate) fn remote_repo(id: u64, owner_id: u64, owner: &str, name: &str) -> RemoteRepo {
    RemoteRepo {
        id: RepoId::new(id),
        name: name.into(),
        full_name: format!("{owner}/{name}"),
        owner: RemoteAccount {
            id: UserId::new(owner_id),
            login: owner.into(),
        },
        language: Some("Rust".into()),
        default_branch: Some("main".into()),
        size: 1,
    }
}

pub(crate) fn remote_commit(
    sha: &str,
    message: &str,
    committer: Option<u64>,
    parent: Option<&str>,
) -> RemoteCommit {
    RemoteCommit {
        sha: sha.into(),
        message: message.into(),
        committer_id: committer.map(UserId::new),
        parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
        date: Some(fixed_now()),
    }
}

#[derive(Default)]
struct FakeState {
    user_repos: Vec<RemoteRepo>,
    orgs: Vec<RemoteAccount>,
    org_repos: HashMap<String, Vec<RemoteRepo>>,
    repos: HashMap<String, RemoteRepo>,
    commits: HashMap<String, Vec<RemoteCommit>>,
    empty: HashSet<String>,
    hooks: HashMap<String, Vec<RemoteHook>>,
    created: Vec<(String, NewHook)>,
    next_hook_id: u64,
    fail_render: bool,
    fail_user_repos: bool,
    calls: Vec<String>,
}

/// Scripted `HostApi`. Every call is recorded as `"<method> <target>"`.
#[derive(Default)]
pub(crate) struct FakeHost {
    state: Mutex<FakeState>,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn record(&self, call: String) {
        self.with(|s| s.calls.push(call));
    }

    pub(crate) fn set_user_repos(&self, repos: Vec<RemoteRepo>) {
        self.with(|s| s.user_repos = repos);
    }

    pub(crate) fn add_org(&self, id: u64, login: &str, repos: Vec<RemoteRepo>) {
        self.with(|s| {
            s.orgs.push(RemoteAccount {
                id: UserId::new(id),
                login: login.into(),
            });
            s.org_repos.insert(login.into(), repos);
        });
    }

    pub(crate) fn add_repo(&self, repo: RemoteRepo) {
        self.with(|s| s.repos.insert(repo.full_name.clone(), repo));
    }

    pub(crate) fn set_commits(&self, full_name: &str, commits: Vec<RemoteCommit>) {
        self.with(|s| s.commits.insert(full_name.into(), commits));
    }

    pub(crate) fn mark_empty(&self, full_name: &str) {
        self.with(|s| s.empty.insert(full_name.into()));
    }

    pub(crate) fn add_remote_hook(&self, full_name: &str, url: &str) {
        self.with(|s| {
            s.next_hook_id += 1;
            let hook = RemoteHook {
                id: s.next_hook_id,
                url: Some(url.into()),
            };
            s.hooks.entry(full_name.into()).or_default().push(hook);
        });
    }

    pub(crate) fn fail_render(&self) {
        self.with(|s| s.fail_render = true);
    }

    pub(crate) fn fail_user_repos(&self) {
        self.with(|s| s.fail_user_repos = true);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub(crate) fn created_hooks(&self) -> Vec<(String, NewHook)> {
        self.with(|s| s.created.clone())
    }

    pub(crate) fn remote_hooks(&self, full_name: &str) -> Vec<RemoteHook> {
        self.with(|s| s.hooks.get(full_name).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn list_user_repos(&self, _creds: &Credentials) -> Result<Vec<RemoteRepo>, HostError> {
        self.record("list_user_repos".into());
        self.with(|s| {
            if s.fail_user_repos {
                Err(HostError::Transport("connection reset".into()))
            } else {
                Ok(s.user_repos.clone())
            }
        })
    }

    async fn list_user_orgs(
        &self,
        _creds: &Credentials,
        login: &str,
    ) -> Result<Vec<RemoteAccount>, HostError> {
        self.record(format!("list_user_orgs {login}"));
        Ok(self.with(|s| s.orgs.clone()))
    }

    async fn list_org_repos(
        &self,
        _creds: &Credentials,
        org: &str,
    ) -> Result<Vec<RemoteRepo>, HostError> {
        self.record(format!("list_org_repos {org}"));
        Ok(self.with(|s| s.org_repos.get(org).cloned().unwrap_or_default()))
    }

    async fn get_repo(
        &self,
        _creds: &Credentials,
        owner: &str,
        repo: &str,
    ) -> Result<RemoteRepo, HostError> {
        let full = format!("{owner}/{repo}");
        self.record(format!("get_repo {full}"));
        self.with(|s| s.repos.get(&full).cloned())
            .ok_or(HostError::NotFound(full))
    }

    async fn list_commits(
        &self,
        _creds: &Credentials,
        owner: &str,
        repo: &str,
        _query: &CommitQuery,
    ) -> Result<Vec<RemoteCommit>, HostError> {
        let full = format!("{owner}/{repo}");
        self.record(format!("list_commits {full}"));
        self.with(|s| {
            if s.empty.contains(&full) {
                Err(HostError::EmptyRepository)
            } else {
                Ok(s.commits.get(&full).cloned().unwrap_or_default())
            }
        })
    }

    async fn get_commit(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<RemoteCommit, HostError> {
        let full = format!("{owner}/{repo}");
        let auth = match creds {
            Credentials::Token(_) => "token",
            Credentials::App { .. } => "app",
        };
        self.record(format!("get_commit {full} {sha} {auth}"));
        self.with(|s| {
            s.commits
                .get(&full)
                .and_then(|commits| commits.iter().find(|c| c.sha == sha).cloned())
        })
        .ok_or_else(|| HostError::NotFound(format!("{full}/commits/{sha}")))
    }

    async fn list_hooks(
        &self,
        _creds: &Credentials,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RemoteHook>, HostError> {
        let full = format!("{owner}/{repo}");
        self.record(format!("list_hooks {full}"));
        Ok(self.remote_hooks(&full))
    }

    async fn create_hook(
        &self,
        _creds: &Credentials,
        owner: &str,
        repo: &str,
        hook: &NewHook,
    ) -> Result<RemoteHook, HostError> {
        let full = format!("{owner}/{repo}");
        self.record(format!("create_hook {full}"));
        Ok(self.with(|s| {
            s.next_hook_id += 1;
            let created = RemoteHook {
                id: s.next_hook_id,
                url: Some(hook.url.clone()),
            };
            s.hooks.entry(full.clone()).or_default().push(created.clone());
            s.created.push((full, hook.clone()));
            created
        }))
    }

    async fn delete_hook(
        &self,
        _creds: &Credentials,
        owner: &str,
        repo: &str,
        hook_id: u64,
    ) -> Result<(), HostError> {
        let full = format!("{owner}/{repo}");
        self.record(format!("delete_hook {full} {hook_id}"));
        self.with(|s| {
            let hooks = s.hooks.entry(full.clone()).or_default();
            let before = hooks.len();
            hooks.retain(|h| h.id != hook_id);
            if hooks.len() == before {
                Err(HostError::NotFound(format!("{full}/hooks/{hook_id}")))
            } else {
                Ok(())
            }
        })
    }

    async fn render_markdown(
        &self,
        _creds: &Credentials,
        text: &str,
        context: &str,
    ) -> Result<String, HostError> {
        self.record(format!("render_markdown {context}"));
        if self.with(|s| s.fail_render) {
            return Err(HostError::Status {
                status: 500,
                message: "render failed".into(),
            });
        }
        Ok(format!("<rendered>{text}</rendered>"))
    }
}

/// In-memory stores, a fake host and a fixed clock wired into a context.
pub(crate) struct TestEnv {
    pub(crate) ctx: Arc<ServiceContext>,
    pub(crate) host: Arc<FakeHost>,
    pub(crate) lists: Arc<InMemoryListStore>,
    pub(crate) documents: Arc<InMemoryDocumentStore>,
}

impl TestEnv {
    pub(crate) fn new(host: FakeHost) -> Self {
        Self::build(host, None)
    }

    /// Like `new`, with client credentials for calls no user can make.
    pub(crate) fn with_app_credentials(host: FakeHost) -> Self {
        Self::build(
            host,
            Some(Credentials::App {
                client_id: "app-id".into(),
                client_secret: "app-secret".into(),
            }),
        )
    }

    fn build(host: FakeHost, app_credentials: Option<Credentials>) -> Self {
        let host = Arc::new(host);
        let lists = Arc::new(InMemoryListStore::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let tasks = Arc::new(TaskStore::new(lists.clone(), QueueKeys::default()));
        let ctx = Arc::new(ServiceContext::new(
            tasks,
            documents.clone(),
            host.clone(),
            Arc::new(FixedClock::new(fixed_now())),
            ServiceSettings {
                callback_url: CALLBACK_URL.into(),
                refresh_interval: Duration::from_secs(3600),
                commit_page_size: 50,
                app_credentials,
            },
        ));
        Self {
            ctx,
            host,
            lists,
            documents,
        }
    }

    pub(crate) async fn add_user(&self, user: User) {
        self.documents.upsert_user(user).await.unwrap();
    }

    /// Raw queue entries, head first.
    pub(crate) fn queued(&self) -> Vec<serde_json::Value> {
        self.lists
            .list_contents("tasks")
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    pub(crate) fn dead_letters(&self) -> Vec<String> {
        self.lists.list_contents("failedtasks")
    }
}
