//! Turning a lesson draft into a stored `Lesson`.

use tracing::debug;

use super::escape::escape_html;
use super::extractor::LessonDraft;
use super::render::{render_body, render_fallback};
use crate::app::ServiceContext;
use crate::domain::{Lesson, LessonId, RepoId, User, UserId};
use crate::ports::DocumentError;

/// Where a draft came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonTarget {
    pub repo_id: RepoId,
    /// `owner/name`, used as the markdown rendering context.
    pub repo_full_name: String,
    pub commit_id: String,
    pub parent_commit_id: Option<String>,
    pub author: UserId,
    /// Repository language, used when the draft declares none.
    pub default_lang: Option<String>,
}

/// Render and persist one lesson.
///
/// `lang` is the declared one or the repository language; `tags` are the
/// declared ones or just `[lang]`. The body is rendered by the host with the
/// `renderer`'s credentials and falls back to the escaped rendering.
pub async fn publish_lesson(
    ctx: &ServiceContext,
    draft: LessonDraft,
    target: LessonTarget,
    renderer: Option<&User>,
) -> Result<Lesson, DocumentError> {
    let lang = draft
        .lang
        .or_else(|| target.default_lang.as_deref().map(escape_html))
        .unwrap_or_default();
    let tags = draft.tags.unwrap_or_else(|| {
        if lang.is_empty() {
            Vec::new()
        } else {
            vec![lang.clone()]
        }
    });

    let fallback = render_fallback(&draft.body);
    let rendered_html = render_body(
        ctx.host.as_ref(),
        renderer,
        &draft.body,
        &target.repo_full_name,
        fallback,
    )
    .await;

    let lesson = Lesson {
        id: LessonId::generate(),
        title: draft.title,
        tags,
        lang,
        body: draft.body,
        rendered_html,
        repo_id: target.repo_id,
        commit_id: target.commit_id,
        parent_commit_id: target.parent_commit_id,
        author: target.author,
        post_date: ctx.clock.now(),
    };
    ctx.documents.insert_lesson(lesson.clone()).await?;
    debug!(lesson_id = %lesson.id, repo_id = %lesson.repo_id, commit = %lesson.commit_id, "lesson stored");
    Ok(lesson)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::extract_lesson;
    use crate::test_support::{FakeHost, TestEnv, fixed_now, user};

    fn target() -> LessonTarget {
        LessonTarget {
            repo_id: RepoId::new(10),
            repo_full_name: "octo/notes".into(),
            commit_id: "c2".into(),
            parent_commit_id: Some("c1".into()),
            author: UserId::new(1),
            default_lang: Some("Rust".into()),
        }
    }

    #[tokio::test]
    async fn defaults_lang_and_tags_from_repository() {
        let env = TestEnv::new(FakeHost::new());
        let draft = extract_lesson("[lesson]\ntitle=T\nbody").unwrap();
        let lesson = publish_lesson(&env.ctx, draft, target(), Some(&user(1, "octo")))
            .await
            .unwrap();

        assert_eq!(lesson.lang, "Rust");
        assert_eq!(lesson.tags, vec!["Rust".to_string()]);
        assert_eq!(lesson.rendered_html, "<rendered>body\r\n</rendered>");
        assert_eq!(lesson.post_date, fixed_now());
        assert_eq!(env.documents.lessons(), vec![lesson]);
    }

    #[tokio::test]
    async fn declared_values_win_and_fallback_without_renderer() {
        let env = TestEnv::new(FakeHost::new());
        let draft = extract_lesson("[lesson]\ntags=a+b\nlang=go\nhello").unwrap();
        let lesson = publish_lesson(&env.ctx, draft, target(), None).await.unwrap();

        assert_eq!(lesson.lang, "go");
        assert_eq!(lesson.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(lesson.rendered_html, "<p>hello</p>");
        assert_eq!(lesson.parent_commit_id.as_deref(), Some("c1"));
    }
}
