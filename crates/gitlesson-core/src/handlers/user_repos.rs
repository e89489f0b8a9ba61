//! `userRepos`: discover a user's repositories and queue hook provisioning.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::app::ServiceContext;
use crate::domain::{HandlerError, HookTask, Outcome, RepoId, Task, UserReposTask};
use crate::ports::{Credentials, HostError, RemoteRepo};
use crate::typed::Handler;

pub struct UserReposHandler {
    ctx: Arc<ServiceContext>,
}

impl UserReposHandler {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    async fn org_repos(
        &self,
        creds: &Credentials,
        login: &str,
    ) -> Result<Vec<RemoteRepo>, HostError> {
        let orgs = self.ctx.host.list_user_orgs(creds, login).await?;
        let lists = try_join_all(
            orgs.iter()
                .map(|org| self.ctx.host.list_org_repos(creds, &org.login)),
        )
        .await?;
        Ok(lists.into_iter().flatten().collect())
    }
}

#[async_trait]
impl Handler<UserReposTask> for UserReposHandler {
    async fn handle(&self, task: UserReposTask) -> Result<Outcome, HandlerError> {
        let ctx = &self.ctx;

        // rescan is booked before any work so a failure here cannot stop it
        let rescan = Task::from(UserReposTask {
            user_id: task.user_id,
            new_user: false,
        });
        let due_at = ctx.now_epoch() + ctx.settings.refresh_interval.as_secs() as i64;
        ctx.tasks.schedule_delayed(&rescan, due_at).await?;

        let user = ctx
            .documents
            .find_user(task.user_id)
            .await?
            .ok_or(HandlerError::UnknownUser(task.user_id))?;
        let creds = ServiceContext::user_credentials(&user);

        let (own, orgs) = tokio::join!(
            ctx.host.list_user_repos(&creds),
            self.org_repos(&creds, &user.username)
        );
        let mut repos = own?;
        repos.extend(orgs?);

        let mut seen = HashSet::new();
        repos.retain(|r| seen.insert(r.id));

        let ids: Vec<RepoId> = repos.iter().map(|r| r.id).collect();
        let hooked = ctx.documents.hooked_repos(&ids).await?;

        let mut enqueued = 0;
        for repo in repos.into_iter().filter(|r| !hooked.contains(&r.id)) {
            let owner_name = (repo.owner.id != user.id).then(|| repo.owner.login.clone());
            let hook = Task::from(HookTask {
                owner_id: user.id,
                repo_name: repo.name,
                owner_name,
                new_user: task.new_user,
            });
            ctx.tasks.enqueue(&hook).await?;
            enqueued += 1;
        }

        if enqueued == 0 {
            debug!(user_id = %user.id, "no unhooked repositories");
        } else {
            info!(user_id = %user.id, enqueued, "queued hook provisioning");
        }
        Ok(Outcome::completed().with_enqueued(enqueued))
    }
}
