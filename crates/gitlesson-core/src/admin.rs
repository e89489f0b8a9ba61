//! Administrative removal of every registered hook.

use thiserror::Error;
use tracing::{info, warn};

use crate::app::ServiceContext;
use crate::domain::{Hook, RepoId};
use crate::ports::{Credentials, DocumentError, HostError};

#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("no stored user can act for {0}")]
    NoCredentials(RepoId),

    #[error("host api: {0}")]
    Host(#[from] HostError),

    #[error("document store: {0}")]
    Documents(#[from] DocumentError),
}

#[derive(Debug, Default)]
pub struct RemovalReport {
    pub removed: usize,
    /// Remote webhooks deleted on the host.
    pub remote_deleted: usize,
    pub failures: Vec<(RepoId, RemovalError)>,
}

/// Delete our webhook from every registered repository, then its record.
/// A failing repository is reported and keeps its record.
pub async fn remove_hooks(ctx: &ServiceContext) -> Result<RemovalReport, DocumentError> {
    let mut report = RemovalReport::default();
    for hook in ctx.documents.all_hooks().await? {
        let repo_id = hook.repo_id;
        match remove_one(ctx, &hook).await {
            Ok(deleted) => {
                report.removed += 1;
                report.remote_deleted += deleted;
            }
            Err(e) => {
                warn!(repo_id = %repo_id, owner = %hook.owner_name, repo = %hook.name, error = %e, "hook removal failed");
                report.failures.push((repo_id, e));
            }
        }
    }
    info!(
        removed = report.removed,
        failed = report.failures.len(),
        "hook removal finished"
    );
    Ok(report)
}

async fn remove_one(ctx: &ServiceContext, hook: &Hook) -> Result<usize, RemovalError> {
    let user = ctx
        .hook_user(hook)
        .await?
        .ok_or(RemovalError::NoCredentials(hook.repo_id))?;
    let creds = Credentials::token(&user.token);

    let remote = match ctx.host.list_hooks(&creds, &hook.owner_name, &hook.name).await {
        Ok(remote) => remote,
        Err(HostError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let mut deleted = 0;
    for remote_hook in remote
        .iter()
        .filter(|h| h.url.as_deref() == Some(ctx.settings.callback_url.as_str()))
    {
        match ctx
            .host
            .delete_hook(&creds, &hook.owner_name, &hook.name, remote_hook.id)
            .await
        {
            Ok(()) => deleted += 1,
            Err(HostError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    ctx.documents.delete_hook(hook.repo_id).await?;
    Ok(deleted)
}
