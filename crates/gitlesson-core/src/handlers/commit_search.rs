//! `commitSearch`: backfill lessons from a repository's recent commits.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::app::ServiceContext;
use crate::domain::{CommitSearchTask, HandlerError, Outcome};
use crate::lesson::{LessonTarget, extract_lesson, publish_lesson};
use crate::ports::{CommitQuery, Credentials, HostError, RemoteCommit, RemoteRepo};
use crate::typed::Handler;

enum CommitResult {
    NoLesson,
    AlreadyStored,
    UnknownAuthor,
    Stored,
}

pub struct CommitSearchHandler {
    ctx: Arc<ServiceContext>,
}

impl CommitSearchHandler {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    async fn process_commit(
        &self,
        repo: &RemoteRepo,
        commit: RemoteCommit,
    ) -> Result<CommitResult, HandlerError> {
        let Some(draft) = extract_lesson(&commit.message) else {
            return Ok(CommitResult::NoLesson);
        };
        let documents = &self.ctx.documents;
        if documents.lesson_exists(repo.id, &commit.sha).await? {
            return Ok(CommitResult::AlreadyStored);
        }
        let Some(author_id) = commit.committer_id else {
            return Ok(CommitResult::UnknownAuthor);
        };
        let Some(author) = documents.find_user(author_id).await? else {
            return Ok(CommitResult::UnknownAuthor);
        };

        let target = LessonTarget {
            repo_id: repo.id,
            repo_full_name: repo.full_name.clone(),
            parent_commit_id: commit.parents.first().cloned(),
            commit_id: commit.sha,
            author: author_id,
            default_lang: repo.language.clone(),
        };
        publish_lesson(&self.ctx, draft, target, Some(&author)).await?;
        Ok(CommitResult::Stored)
    }
}

#[async_trait]
impl Handler<CommitSearchTask> for CommitSearchHandler {
    async fn handle(&self, task: CommitSearchTask) -> Result<Outcome, HandlerError> {
        let ctx = &self.ctx;
        let creds = Credentials::token(&task.owner_token);

        let repo = match ctx.host.get_repo(&creds, &task.owner_name, &task.repo_name).await {
            Ok(repo) => repo,
            Err(HostError::EmptyRepository) => {
                debug!(owner = %task.owner_name, repo = %task.repo_name, "empty repository");
                return Ok(Outcome::skipped("repository is empty"));
            }
            Err(e) => return Err(e.into()),
        };

        let query = CommitQuery {
            per_page: ctx.settings.commit_page_size,
            since: None,
        };
        let commits = match ctx
            .host
            .list_commits(&creds, &task.owner_name, &task.repo_name, &query)
            .await
        {
            Ok(commits) => commits,
            Err(HostError::EmptyRepository) => {
                debug!(repo = %repo.full_name, "empty repository");
                return Ok(Outcome::skipped("repository is empty"));
            }
            Err(e) => return Err(e.into()),
        };

        let results = join_all(commits.into_iter().map(|commit| {
            let sha = commit.sha.clone();
            let repo = &repo;
            async move { (sha, self.process_commit(repo, commit).await) }
        }))
        .await;

        let (mut stored, mut failed, mut unknown) = (0, 0, 0);
        for (sha, result) in results {
            match result {
                Ok(CommitResult::Stored) => stored += 1,
                Ok(CommitResult::UnknownAuthor) => unknown += 1,
                Ok(CommitResult::NoLesson | CommitResult::AlreadyStored) => {}
                Err(e) => {
                    error!(repo = %repo.full_name, commit = %sha, error = %e, "lesson backfill failed");
                    failed += 1;
                }
            }
        }
        info!(repo = %repo.full_name, stored, failed, unknown_authors = unknown, "backfill done");
        Ok(Outcome::completed()
            .with_persisted(stored)
            .with_failed_items(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OutcomeKind, RepoId, UserId};
    use crate::test_support::{FakeHost, TestEnv, remote_commit, remote_repo, user};

    fn task() -> CommitSearchTask {
        CommitSearchTask {
            owner_name: "octo".into(),
            owner_token: "token-octo".into(),
            repo_name: "notes".into(),
        }
    }

    #[tokio::test]
    async fn empty_repository_is_skipped_quietly() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(10, 1, "octo", "notes"));
        host.mark_empty("octo/notes");
        let env = TestEnv::new(host);

        let outcome = CommitSearchHandler::new(env.ctx.clone())
            .handle(task())
            .await
            .unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Skipped);
        assert!(env.documents.lessons().is_empty());
        assert!(env.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn reported_zero_size_still_lists_commits() {
        let host = FakeHost::new();
        let mut repo = remote_repo(10, 1, "octo", "notes");
        repo.size = 0;
        host.add_repo(repo);
        host.set_commits(
            "octo/notes",
            vec![remote_commit("c1", "[lesson]\nbody", Some(1), None)],
        );
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        let outcome = CommitSearchHandler::new(env.ctx.clone())
            .handle(task())
            .await
            .unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Completed);
        assert_eq!(outcome.persisted, 1);
        assert_eq!(env.documents.lessons().len(), 1);
    }

    #[tokio::test]
    async fn stores_lessons_for_known_authors() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(10, 1, "octo", "notes"));
        host.set_commits(
            "octo/notes",
            vec![
                remote_commit("c3", "[lesson]\ntitle=Three\nbody", Some(1), Some("c2")),
                remote_commit("c2", "plain commit", Some(1), Some("c1")),
                remote_commit("c1", "[lesson]\nby a stranger", Some(77), None),
                remote_commit("c0", "[lesson]\nno committer", None, None),
            ],
        );
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        let outcome = CommitSearchHandler::new(env.ctx.clone())
            .handle(task())
            .await
            .unwrap();
        assert_eq!(outcome.persisted, 1);
        assert_eq!(outcome.failed_items, 0);

        let lessons = env.documents.lessons();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].commit_id, "c3");
        assert_eq!(lessons[0].parent_commit_id.as_deref(), Some("c2"));
        assert_eq!(lessons[0].repo_id, RepoId::new(10));
        assert_eq!(lessons[0].author, UserId::new(1));
        assert_eq!(lessons[0].title.as_deref(), Some("Three"));
    }

    #[tokio::test]
    async fn rerun_does_not_duplicate() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(10, 1, "octo", "notes"));
        host.set_commits(
            "octo/notes",
            vec![remote_commit("c1", "[lesson]\nbody", Some(1), None)],
        );
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        let handler = CommitSearchHandler::new(env.ctx.clone());
        handler.handle(task()).await.unwrap();
        let second = handler.handle(task()).await.unwrap();
        assert_eq!(second.persisted, 0);
        assert_eq!(env.documents.lessons().len(), 1);
    }

    #[tokio::test]
    async fn render_failure_keeps_lesson_with_fallback() {
        let host = FakeHost::new();
        host.add_repo(remote_repo(10, 1, "octo", "notes"));
        host.set_commits(
            "octo/notes",
            vec![remote_commit("c1", "[lesson]\nbody <b>", Some(1), None)],
        );
        host.fail_render();
        let env = TestEnv::new(host);
        env.add_user(user(1, "octo")).await;

        CommitSearchHandler::new(env.ctx.clone())
            .handle(task())
            .await
            .unwrap();
        let lessons = env.documents.lessons();
        assert_eq!(lessons[0].rendered_html, "<p>body &lt;b&gt;</p>");
    }
}
