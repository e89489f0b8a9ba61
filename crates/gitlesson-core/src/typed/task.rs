//! TaskPayload - binds a payload struct to its `TaskKind`.
//!
//! The queue carries the closed `Task` enum; handlers are written against the
//! variant payloads. `KIND` ties the two together at compile time.

use crate::domain::{CommitSearchTask, HookTask, Task, TaskKind, UserReposTask};

/// A payload carried by exactly one `Task` variant.
///
/// # Example
/// ```ignore
/// impl TaskPayload for HookTask {
///     const KIND: TaskKind = TaskKind::Hook;
///     ...
/// }
/// ```
pub trait TaskPayload: Send + Sync + Sized + 'static {
    const KIND: TaskKind;

    /// Unwrap the matching variant, or hand the task back unchanged.
    fn from_task(task: Task) -> Result<Self, Task>;
}

impl TaskPayload for UserReposTask {
    const KIND: TaskKind = TaskKind::UserRepos;

    fn from_task(task: Task) -> Result<Self, Task> {
        match task {
            Task::UserRepos(t) => Ok(t),
            other => Err(other),
        }
    }
}

impl TaskPayload for HookTask {
    const KIND: TaskKind = TaskKind::Hook;

    fn from_task(task: Task) -> Result<Self, Task> {
        match task {
            Task::Hook(t) => Ok(t),
            other => Err(other),
        }
    }
}

impl TaskPayload for CommitSearchTask {
    const KIND: TaskKind = TaskKind::CommitSearch;

    fn from_task(task: Task) -> Result<Self, Task> {
        match task {
            Task::CommitSearch(t) => Ok(t),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    #[test]
    fn kinds_match_variants() {
        let task = Task::from(UserReposTask {
            user_id: UserId::new(1),
            new_user: false,
        });
        assert_eq!(task.kind(), UserReposTask::KIND);
        assert!(UserReposTask::from_task(task.clone()).is_ok());
        assert_eq!(HookTask::from_task(task.clone()), Err(task));
    }
}
