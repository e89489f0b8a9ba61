//! Lesson body rendering: remote markdown with a local fallback.

use tracing::warn;

use super::escape::escape_html;
use crate::domain::User;
use crate::ports::{Credentials, HostApi};

/// Escaped body as HTML: blank-line separated paragraphs in `<p>`, inner
/// line breaks as `<br>`.
pub fn render_fallback(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n");
    let mut html = String::new();
    let mut paragraph: Vec<String> = Vec::new();

    for line in normalized.lines() {
        if line.trim().is_empty() {
            flush(&mut paragraph, &mut html);
        } else {
            paragraph.push(escape_html(line));
        }
    }
    flush(&mut paragraph, &mut html);
    html
}

fn flush(paragraph: &mut Vec<String>, html: &mut String) {
    if !paragraph.is_empty() {
        html.push_str("<p>");
        html.push_str(&paragraph.join("<br>"));
        html.push_str("</p>");
        paragraph.clear();
    }
}

/// Render `body` through the host with `renderer`'s credentials, or return
/// `fallback` when there is no renderer or the call fails.
pub async fn render_body(
    host: &dyn HostApi,
    renderer: Option<&User>,
    body: &str,
    context: &str,
    fallback: String,
) -> String {
    let Some(user) = renderer else {
        return fallback;
    };
    match host
        .render_markdown(&Credentials::token(&user.token), body, context)
        .await
    {
        Ok(html) => html,
        Err(e) => {
            warn!(user_id = %user.id, context, error = %e, "markdown render failed, using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHost, user};

    #[test]
    fn paragraphs_and_breaks() {
        let html = render_fallback("one\r\ntwo\r\n\r\nthree & four\r\n");
        assert_eq!(html, "<p>one<br>two</p><p>three &amp; four</p>");
    }

    #[test]
    fn empty_body_renders_nothing() {
        assert_eq!(render_fallback(""), "");
    }

    #[tokio::test]
    async fn uses_host_when_renderer_known() {
        let host = FakeHost::new();
        let html = render_body(&host, Some(&user(1, "octo")), "# hi", "octo/notes", "fb".into()).await;
        assert_eq!(html, "<rendered># hi</rendered>");
        assert_eq!(host.calls(), vec!["render_markdown octo/notes"]);
    }

    #[tokio::test]
    async fn falls_back_without_renderer_or_on_failure() {
        let host = FakeHost::new();
        assert_eq!(render_body(&host, None, "x", "o/r", "fb".into()).await, "fb");
        assert!(host.calls().is_empty());

        host.fail_render();
        let html = render_body(&host, Some(&user(1, "octo")), "x", "o/r", "fb".into()).await;
        assert_eq!(html, "fb");
    }
}
