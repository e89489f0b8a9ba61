//! Handler trait - typed handlers and their type-erased form.
//!
//! - `Handler<T>`: written against one payload type
//! - `DynHandler`: object-safe, takes the whole `Task`
//! - `TypedHandler<T, H>`: adapter from the first to the second

use std::marker::PhantomData;

use async_trait::async_trait;

use super::task::TaskPayload;
use crate::domain::{HandlerError, Outcome, Task, TaskKind};

/// Executes one payload type.
///
/// `Handler<HookTask>` only ever receives a `HookTask`; the registry does the
/// variant matching.
#[async_trait]
pub trait Handler<T: TaskPayload>: Send + Sync {
    async fn handle(&self, task: T) -> Result<Outcome, HandlerError>;
}

/// Object-safe handler, stored as `Arc<dyn DynHandler>` in the registry.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, task: Task) -> Result<Outcome, HandlerError>;
    fn kind(&self) -> TaskKind;
}

pub struct TypedHandler<T: TaskPayload, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn(T)>,
}

impl<T: TaskPayload, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskPayload, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, task: Task) -> Result<Outcome, HandlerError> {
        let payload =
            T::from_task(task).map_err(|other| HandlerError::PayloadMismatch(other.kind()))?;
        self.handler.handle(payload).await
    }

    fn kind(&self) -> TaskKind {
        T::KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HookTask, OutcomeKind, UserId, UserReposTask};

    struct CountingHandler;

    #[async_trait]
    impl Handler<UserReposTask> for CountingHandler {
        async fn handle(&self, task: UserReposTask) -> Result<Outcome, HandlerError> {
            Ok(Outcome::completed().with_enqueued(task.user_id.get() as usize))
        }
    }

    #[tokio::test]
    async fn typed_handler_unwraps_variant() {
        let handler = TypedHandler::<UserReposTask, _>::new(CountingHandler);
        assert_eq!(handler.kind(), TaskKind::UserRepos);

        let task = Task::from(UserReposTask {
            user_id: UserId::new(3),
            new_user: false,
        });
        let outcome = handler.handle_dyn(task).await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Completed);
        assert_eq!(outcome.enqueued, 3);
    }

    #[tokio::test]
    async fn wrong_variant_is_a_mismatch() {
        let handler = TypedHandler::<UserReposTask, _>::new(CountingHandler);
        let task = Task::from(HookTask {
            owner_id: UserId::new(1),
            repo_name: "notes".into(),
            owner_name: None,
            new_user: false,
        });
        let err = handler.handle_dyn(task).await.unwrap_err();
        assert!(matches!(err, HandlerError::PayloadMismatch(TaskKind::Hook)));
    }
}
