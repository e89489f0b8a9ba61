//! Push delivery processing: headers, signature, branch filter, force-push
//! reconciliation, then one lesson per annotated commit.

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::payload::{PushCommit, PushEvent};
use super::signature::verify_signature;
use crate::app::ServiceContext;
use crate::domain::{Hook, RepoId, User};
use crate::lesson::{LessonTarget, extract_lesson, publish_lesson};
use crate::ports::DocumentError;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("payload has no repository id")]
    MissingRepository,

    #[error("unregistered hook for {0}")]
    UnregisteredHook(RepoId),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("document store: {0}")]
    Documents(#[from] DocumentError),
}

impl WebhookError {
    /// HTTP status the delivery is answered with.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::MissingHeader(_)
            | WebhookError::InvalidJson(_)
            | WebhookError::MissingRepository
            | WebhookError::UnregisteredHook(_) => 400,
            WebhookError::InvalidSignature => 401,
            WebhookError::Documents(_) => 500,
        }
    }
}

/// One inbound delivery: the headers we read and the raw body.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    pub event: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub delivery_id: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub commits: usize,
    pub lessons: usize,
    pub failed: usize,
    /// Lessons removed by force-push reconciliation.
    pub reconciled: usize,
    pub reconcile_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Acknowledged without doing anything.
    Ignored(&'static str),
    Processed(PushReport),
}

pub async fn process_delivery(
    ctx: &ServiceContext,
    delivery: Delivery<'_>,
) -> Result<DeliveryOutcome, WebhookError> {
    let event = delivery.event.ok_or(WebhookError::MissingHeader(EVENT_HEADER))?;
    let signature = delivery
        .signature
        .ok_or(WebhookError::MissingHeader(SIGNATURE_HEADER))?;
    let delivery_id = delivery.delivery_id.unwrap_or("-");

    if event != "push" {
        debug!(event, delivery_id, "ignoring non-push event");
        return Ok(DeliveryOutcome::Ignored("not a push event"));
    }

    let push: PushEvent =
        serde_json::from_slice(delivery.body).map_err(WebhookError::InvalidJson)?;
    let repo_id = push.repo_id().ok_or(WebhookError::MissingRepository)?;

    let hook = ctx
        .documents
        .find_hook(repo_id)
        .await?
        .ok_or(WebhookError::UnregisteredHook(repo_id))?;

    if !verify_signature(hook.secret.as_bytes(), delivery.body, signature) {
        warn!(repo_id = %repo_id, delivery_id, "signature mismatch");
        return Err(WebhookError::InvalidSignature);
    }

    if !push.is_default_branch() {
        debug!(repo_id = %repo_id, git_ref = %push.git_ref, "push to non-default branch");
        return Ok(DeliveryOutcome::Ignored("not the default branch"));
    }

    let mut parents = push.parent_ids();
    let mut report = PushReport {
        commits: push.commits.len(),
        ..PushReport::default()
    };

    if push.forced {
        resolve_parents(ctx, &hook, &push.commits, &mut parents).await;
        reconcile(ctx, repo_id, &parents, &mut report).await;
    }

    let author = push
        .sender
        .as_ref()
        .map(|s| s.id)
        .unwrap_or(hook.linked_user_id);
    let renderer = match ctx.documents.find_user(author).await {
        Ok(user) => user,
        Err(e) => {
            warn!(user_id = %author, error = %e, "author lookup failed, rendering locally");
            None
        }
    };

    let full_name = repo_full_name(&push, &hook);
    let language = push.repository.as_ref().and_then(|r| r.language.clone());
    let results = join_all(push.commits.iter().zip(parents).map(|(commit, parent)| {
        let target = LessonTarget {
            repo_id,
            repo_full_name: full_name.clone(),
            commit_id: commit.id.clone(),
            parent_commit_id: parent,
            author,
            default_lang: language.clone(),
        };
        store_commit(ctx, &commit.message, target, renderer.as_ref())
    }))
    .await;

    for result in results {
        match result {
            Ok(true) => report.lessons += 1,
            Ok(false) => {}
            Err(_) => report.failed += 1,
        }
    }

    info!(
        repo_id = %repo_id,
        delivery_id,
        commits = report.commits,
        lessons = report.lessons,
        failed = report.failed,
        reconciled = report.reconciled,
        "push processed"
    );
    Ok(DeliveryOutcome::Processed(report))
}

/// Ask the host for the first parent of every commit whose parent the payload
/// leaves unknown. Uses the hook user's token, else the app credentials.
/// Commits that cannot be resolved keep `None`.
async fn resolve_parents(
    ctx: &ServiceContext,
    hook: &Hook,
    commits: &[PushCommit],
    parents: &mut [Option<String>],
) {
    let missing: Vec<usize> = (0..parents.len()).filter(|&i| parents[i].is_none()).collect();
    if missing.is_empty() {
        return;
    }
    let user = match ctx.hook_user(hook).await {
        Ok(user) => user,
        Err(e) => {
            warn!(repo_id = %hook.repo_id, error = %e, "hook user lookup failed");
            None
        }
    };
    let Some(creds) = ctx.credentials_for(user.as_ref()) else {
        warn!(repo_id = %hook.repo_id, "no credentials to resolve parents of a forced push");
        return;
    };

    let creds = &creds;
    let resolved = join_all(missing.into_iter().map(|i| async move {
        let sha = &commits[i].id;
        match ctx.host.get_commit(creds, &hook.owner_name, &hook.name, sha).await {
            Ok(commit) => (i, commit.parents.into_iter().next()),
            Err(e) => {
                warn!(repo_id = %hook.repo_id, commit = %sha, error = %e, "parent lookup failed");
                (i, None)
            }
        }
    }))
    .await;
    for (i, parent) in resolved {
        parents[i] = parent;
    }
}

/// Drop lessons built on parents the push rewrote. All deletions finish
/// before any new commit is looked at.
async fn reconcile(
    ctx: &ServiceContext,
    repo_id: RepoId,
    parents: &[Option<String>],
    report: &mut PushReport,
) {
    let results = join_all(
        parents
            .iter()
            .flatten()
            .map(|parent| async move {
                let result = ctx.documents.delete_lessons_by_parent(repo_id, parent).await;
                (parent, result)
            }),
    )
    .await;

    for (parent, result) in results {
        match result {
            Ok(deleted) => report.reconciled += deleted,
            Err(e) => {
                error!(repo_id = %repo_id, parent = %parent, error = %e, "force-push cleanup failed");
                report.reconcile_failures += 1;
            }
        }
    }
}

async fn store_commit(
    ctx: &ServiceContext,
    message: &str,
    target: LessonTarget,
    renderer: Option<&User>,
) -> Result<bool, DocumentError> {
    let Some(draft) = extract_lesson(message) else {
        return Ok(false);
    };
    let commit_id = target.commit_id.clone();
    let repo_id = target.repo_id;
    let stored = match ctx.documents.lesson_exists(repo_id, &commit_id).await {
        Ok(true) => return Ok(false),
        Ok(false) => publish_lesson(ctx, draft, target, renderer).await.map(|_| true),
        Err(e) => Err(e),
    };
    if let Err(e) = &stored {
        error!(repo_id = %repo_id, commit = %commit_id, error = %e, "storing lesson failed");
    }
    stored
}

fn repo_full_name(push: &PushEvent, hook: &Hook) -> String {
    push.repository
        .as_ref()
        .and_then(|r| r.full_name.clone())
        .unwrap_or_else(|| format!("{}/{}", hook.owner_name, hook.name))
}
