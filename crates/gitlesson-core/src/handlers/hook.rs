//! `hook`: provision the push webhook on one repository.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::app::ServiceContext;
use crate::domain::{CommitSearchTask, HandlerError, Hook, HookTask, Outcome, Task};
use crate::ports::{DocumentError, NewHook};
use crate::typed::Handler;

const SECRET_BYTES: usize = 20;

/// Random webhook secret, lowercase hex.
pub fn generate_secret() -> String {
    let bytes: [u8; SECRET_BYTES] = rand::random();
    hex::encode(bytes)
}

pub struct HookHandler {
    ctx: Arc<ServiceContext>,
}

impl HookHandler {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Handler<HookTask> for HookHandler {
    async fn handle(&self, task: HookTask) -> Result<Outcome, HandlerError> {
        let ctx = &self.ctx;
        let user = ctx
            .documents
            .find_user(task.owner_id)
            .await?
            .ok_or(HandlerError::UnknownUser(task.owner_id))?;
        let login = task.owner_name.clone().unwrap_or_else(|| user.username.clone());
        let creds = ServiceContext::user_credentials(&user);

        let repo = ctx.host.get_repo(&creds, &login, &task.repo_name).await?;
        let existing = ctx.host.list_hooks(&creds, &login, &task.repo_name).await?;
        let callback_url = &ctx.settings.callback_url;

        let mut outcome = Outcome::completed();
        if existing
            .iter()
            .any(|h| h.url.as_deref() == Some(callback_url.as_str()))
        {
            info!(repo = %repo.full_name, "webhook already configured");
            outcome = outcome.with_reason("webhook already configured");
        } else {
            let secret = generate_secret();
            ctx.host
                .create_hook(
                    &creds,
                    &login,
                    &task.repo_name,
                    &NewHook {
                        url: callback_url.clone(),
                        secret: secret.clone(),
                    },
                )
                .await?;

            let hook = Hook {
                repo_id: repo.id,
                owner_id: repo.owner.id,
                owner_name: repo.owner.login.clone(),
                name: repo.name.clone(),
                url: callback_url.clone(),
                secret,
                linked_user_id: user.id,
                add_date: ctx.clock.now(),
            };
            match ctx.documents.insert_hook(hook).await {
                Ok(()) => {
                    info!(repo = %repo.full_name, repo_id = %repo.id, "webhook created");
                    outcome = outcome.with_persisted(1);
                }
                Err(DocumentError::DuplicateHook(id)) => {
                    warn!(repo_id = %id, "hook record already present, keeping it");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !task.new_user {
            let backfill = Task::from(CommitSearchTask {
                owner_name: login,
                owner_token: user.token.clone(),
                repo_name: task.repo_name,
            });
            ctx.tasks.enqueue(&backfill).await?;
            outcome = outcome.with_enqueued(1);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::domain::{RepoId, UserId};
    use crate::ports::{DocumentStore, HostError};
    use crate::test_support::{CALLBACK_URL, FakeHost, TestEnv, fixed_now, remote_repo, user};

    fn task(owner_name: Option<&str>, new_user: bool) -> HookTask {
        HookTask {
            owner_id: UserId::new(1),
            repo_name: "notes".into(),
            owner_name: owner_name.map(str::to_string),
            new_user,
        }
    }

    #[test]
    fn secret_is_hex_of_twenty_bytes() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 40);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(secret, generate_secret());
    }

    #[tokio::test]
    async fn creates_hook_and_queues_backfill() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(10, 1, "octo", "notes"));
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        let outcome = HookHandler::new(env.ctx.clone())
            .handle(task(None, false))
            .await
            .unwrap();
        assert_eq!(outcome.persisted, 1);
        assert_eq!(outcome.enqueued, 1);

        let created = env.host.created_hooks();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "octo/notes");
        assert_eq!(created[0].1.url, CALLBACK_URL);

        let stored = env.documents.find_hook(RepoId::new(10)).await.unwrap().unwrap();
        assert_eq!(stored.secret, created[0].1.secret);
        assert_eq!(stored.linked_user_id, UserId::new(1));
        assert_eq!(stored.add_date, fixed_now());

        assert_eq!(
            env.queued(),
            vec![json!({
                "type": "commitSearch",
                "ownerName": "octo",
                "ownerToken": "token-octo",
                "repoName": "notes"
            })]
        );
    }

    #[tokio::test]
    async fn existing_remote_hook_is_left_alone() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(10, 1, "octo", "notes"));
        host.add_remote_hook("octo/notes", CALLBACK_URL);
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        let outcome = HookHandler::new(env.ctx.clone())
            .handle(task(None, false))
            .await
            .unwrap();

        assert!(env.host.created_hooks().is_empty());
        assert!(env.documents.all_hooks().await.unwrap().is_empty());
        assert_eq!(outcome.persisted, 0);
        assert_eq!(env.queued().len(), 1);
        assert_eq!(env.queued()[0]["type"], "commitSearch");
    }

    #[tokio::test]
    async fn new_user_skips_backfill_and_org_login_is_used() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(20, 50, "acme", "notes"));
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        HookHandler::new(env.ctx.clone())
            .handle(task(Some("acme"), true))
            .await
            .unwrap();

        assert!(env.queued().is_empty());
        assert!(env.host.calls().contains(&"create_hook acme/notes".to_string()));
        let stored = env.documents.find_hook(RepoId::new(20)).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, UserId::new(50));
        assert_eq!(stored.owner_name, "acme");
    }

    #[tokio::test]
    async fn missing_repository_fails() {
        let env = TestEnv::new(FakeHost::new());
        env.add_user(user(1, "octo")).await;
        let err = HookHandler::new(env.ctx.clone())
            .handle(task(None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Host(HostError::NotFound(_))));
    }
}
