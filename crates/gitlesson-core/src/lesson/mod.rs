//! Lessons: extraction from commit messages, rendering and persistence.

pub mod escape;
pub mod extractor;
pub mod publish;
pub mod render;

pub use self::escape::escape_html;
pub use self::extractor::{LESSON_MARKER, LessonDraft, extract_lesson};
pub use self::publish::{LessonTarget, publish_lesson};
pub use self::render::{render_body, render_fallback};
