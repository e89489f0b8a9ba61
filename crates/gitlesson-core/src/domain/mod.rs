//! Domain model (ids, tasks, records, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod models;
pub mod outcome;
pub mod task;

pub use errors::{ErrorKind, HandlerError};
pub use ids::{LessonId, RepoId, UserId};
pub use models::{Hook, Lesson, User};
pub use outcome::{Outcome, OutcomeKind};
pub use task::{CommitSearchTask, HookTask, Task, TaskKind, UserReposTask};
