//! Lesson extraction from commit messages.
//!
//! ```text
//! <anything>
//! [lesson]
//! title=<text>     optional, must come first
//! tags=<text>      optional, after title
//! lang=<text>      optional, after tags
//! <body...>
//! ```

use super::escape::escape_html;

pub const LESSON_MARKER: &str = "[lesson]";

/// What a commit message declares. Metadata is already HTML-escaped; the
/// body is raw text with every line terminated by `\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub lang: Option<String>,
    pub body: String,
}

/// Parse `message`. `None` when there is no marker line or nothing follows it.
pub fn extract_lesson(message: &str) -> Option<LessonDraft> {
    let normalized = message.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.lines().collect();

    let marker = lines.iter().position(|l| l.starts_with(LESSON_MARKER))?;
    let mut rest = &lines[marker + 1..];
    if rest.is_empty() {
        return None;
    }

    let title = take_declaration(&mut rest, "title=");
    let tags = take_declaration(&mut rest, "tags=").and_then(|raw| {
        let tags: Vec<String> = raw
            .split([',', ' ', '+'])
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        (!tags.is_empty()).then_some(tags)
    });
    let lang = take_declaration(&mut rest, "lang=");

    let body: String = rest.iter().map(|line| format!("{line}\r\n")).collect();

    Some(LessonDraft {
        title,
        tags,
        lang,
        body,
    })
}

// Consumes the cursor line when it starts with `prefix`. Returns the escaped
// value, or None when the line does not match or the value is blank.
fn take_declaration(rest: &mut &[&str], prefix: &str) -> Option<String> {
    let value = rest.first()?.strip_prefix(prefix)?;
    *rest = &rest[1..];
    let value = value.trim();
    (!value.is_empty()).then(|| escape_html(value))
}
