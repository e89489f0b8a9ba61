//! `HostApi` over the GitHub REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::domain::{RepoId, UserId};
use crate::ports::{
    CommitQuery, Credentials, HostApi, HostError, NewHook, RemoteAccount, RemoteCommit,
    RemoteHook, RemoteRepo,
};

const PAGE_SIZE: usize = 100;
const MAX_PAGES: u32 = 50;

pub struct GitHubClient {
    base_url: String,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str, creds: &Credentials) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/vnd.github+json");
        match creds {
            Credentials::Token(token) => req.bearer_auth(token),
            Credentials::App {
                client_id,
                client_secret,
            } => req.basic_auth(client_id, Some(client_secret)),
        }
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response, HostError> {
        let resp = req
            .send()
            .await
            .map_err(|e| HostError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => HostError::NotFound(what.to_string()),
            // GitHub answers 409 "Git Repository is empty" on commit listings.
            StatusCode::CONFLICT => HostError::EmptyRepository,
            _ => HostError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<T, HostError> {
        self.send(req, what)
            .await?
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(format!("{what}: {e}")))
    }

    /// Follow `page` until a short page, converting each wire item.
    async fn paged<W, T>(&self, path: &str, creds: &Credentials) -> Result<Vec<T>, HostError>
    where
        W: DeserializeOwned,
        T: From<W>,
    {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let req = self
                .request(Method::GET, path, creds)
                .query(&[("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())]);
            let batch: Vec<W> = self.get_json(req, path).await?;
            let done = batch.len() < PAGE_SIZE;
            items.extend(batch.into_iter().map(T::from));
            if done {
                break;
            }
        }
        Ok(items)
    }
}

#[derive(Deserialize)]
struct AccountWire {
    id: u64,
    login: String,
}

impl From<AccountWire> for RemoteAccount {
    fn from(w: AccountWire) -> Self {
        RemoteAccount {
            id: UserId::new(w.id),
            login: w.login,
        }
    }
}

#[derive(Deserialize)]
struct RepoWire {
    id: u64,
    name: String,
    full_name: String,
    owner: AccountWire,
    language: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    size: u64,
}

impl From<RepoWire> for RemoteRepo {
    fn from(w: RepoWire) -> Self {
        RemoteRepo {
            id: RepoId::new(w.id),
            name: w.name,
            full_name: w.full_name,
            owner: w.owner.into(),
            language: w.language,
            default_branch: w.default_branch,
            size: w.size,
        }
    }
}

#[derive(Deserialize)]
struct CommitWire {
    sha: String,
    commit: CommitDetail,
    committer: Option<IdOnly>,
    #[serde(default)]
    parents: Vec<ShaOnly>,
}

#[derive(Deserialize)]
struct CommitDetail {
    message: String,
    committer: Option<Signature>,
}

#[derive(Deserialize)]
struct Signature {
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: u64,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

impl From<CommitWire> for RemoteCommit {
    fn from(w: CommitWire) -> Self {
        RemoteCommit {
            sha: w.sha,
            message: w.commit.message,
            committer_id: w.committer.map(|c| UserId::new(c.id)),
            parents: w.parents.into_iter().map(|p| p.sha).collect(),
            date: w.commit.committer.and_then(|s| s.date),
        }
    }
}

#[derive(Deserialize)]
struct HookWire {
    id: u64,
    #[serde(default)]
    config: HookConfigWire,
}

#[derive(Deserialize, Default)]
struct HookConfigWire {
    url: Option<String>,
}

impl From<HookWire> for RemoteHook {
    fn from(w: HookWire) -> Self {
        RemoteHook {
            id: w.id,
            url: w.config.url,
        }
    }
}

#[async_trait]
impl HostApi for GitHubClient {
    async fn list_user_repos(&self, creds: &Credentials) -> Result<Vec<RemoteRepo>, HostError> {
        self.paged::<RepoWire, _>("/user/repos", creds).await
    }

    async fn list_user_orgs(
        &self,
        creds: &Credentials,
        login: &str,
    ) -> Result<Vec<RemoteAccount>, HostError> {
        let path = format!("/users/{login}/orgs");
        let req = self.request(Method::GET, &path, creds);
        let orgs: Vec<AccountWire> = self.get_json(req, &path).await?;
        Ok(orgs.into_iter().map(RemoteAccount::from).collect())
    }

    async fn list_org_repos(
        &self,
        creds: &Credentials,
        org: &str,
    ) -> Result<Vec<RemoteRepo>, HostError> {
        self.paged::<RepoWire, _>(&format!("/orgs/{org}/repos"), creds)
            .await
    }

    async fn get_repo(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
    ) -> Result<RemoteRepo, HostError> {
        let path = format!("/repos/{owner}/{repo}");
        let req = self.request(Method::GET, &path, creds);
        let wire: RepoWire = self.get_json(req, &path).await?;
        Ok(wire.into())
    }

    async fn list_commits(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        query: &CommitQuery,
    ) -> Result<Vec<RemoteCommit>, HostError> {
        let path = format!("/repos/{owner}/{repo}/commits");
        let mut params = vec![("per_page", query.per_page.to_string())];
        if let Some(since) = query.since {
            params.push(("since", since.to_rfc3339()));
        }
        let req = self.request(Method::GET, &path, creds).query(&params);
        let commits: Vec<CommitWire> = self.get_json(req, &path).await?;
        Ok(commits.into_iter().map(RemoteCommit::from).collect())
    }

    async fn get_commit(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<RemoteCommit, HostError> {
        let path = format!("/repos/{owner}/{repo}/commits/{sha}");
        let req = self.request(Method::GET, &path, creds);
        let wire: CommitWire = self.get_json(req, &path).await?;
        Ok(wire.into())
    }

    async fn list_hooks(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RemoteHook>, HostError> {
        self.paged::<HookWire, _>(&format!("/repos/{owner}/{repo}/hooks"), creds)
            .await
    }

    async fn create_hook(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        hook: &NewHook,
    ) -> Result<RemoteHook, HostError> {
        let path = format!("/repos/{owner}/{repo}/hooks");
        let body = json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": {
                "url": hook.url,
                "content_type": "json",
                "secret": hook.secret,
            },
        });
        let req = self.request(Method::POST, &path, creds).json(&body);
        let wire: HookWire = self.get_json(req, &path).await?;
        Ok(wire.into())
    }

    async fn delete_hook(
        &self,
        creds: &Credentials,
        owner: &str,
        repo: &str,
        hook_id: u64,
    ) -> Result<(), HostError> {
        let path = format!("/repos/{owner}/{repo}/hooks/{hook_id}");
        let req = self.request(Method::DELETE, &path, creds);
        self.send(req, &path).await?;
        Ok(())
    }

    async fn render_markdown(
        &self,
        creds: &Credentials,
        text: &str,
        context: &str,
    ) -> Result<String, HostError> {
        let body = json!({ "text": text, "mode": "gfm", "context": context });
        let req = self.request(Method::POST, "/markdown", creds).json(&body);
        self.send(req, "/markdown")
            .await?
            .text()
            .await
            .map_err(|e| HostError::Decode(format!("/markdown: {e}")))
    }
}
