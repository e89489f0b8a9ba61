//! AppBuilder - handler registration with fail-fast startup checks.

use std::sync::Arc;

use super::context::ServiceContext;
use crate::domain::{CommitSearchTask, HookTask, TaskKind, UserReposTask};
use crate::handlers::{CommitSearchHandler, HookHandler, UserReposHandler};
use crate::typed::{Handler, RegistryError, TaskPayload, TypedRegistry};

/// Builds an [`App`].
///
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<HookTask, _>(HookHandler::new(ctx.clone()))?
///     .expect_all_kinds()
///     .build()?;
/// ```
///
/// `build()` fails when an expected kind has no handler, so a deployment
/// that would dead-letter a whole task kind never starts.
pub struct AppBuilder {
    registry: TypedRegistry,
    expected_kinds: Option<Vec<TaskKind>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing handlers for task kinds {0:?}")]
    MissingTaskKinds(Vec<TaskKind>),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TypedRegistry::new(),
            expected_kinds: None,
        }
    }

    pub fn register<T: TaskPayload, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn expect_kinds(mut self, kinds: &[TaskKind]) -> Self {
        self.expected_kinds = Some(kinds.to_vec());
        self
    }

    pub fn expect_all_kinds(self) -> Self {
        self.expect_kinds(&TaskKind::ALL)
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_kinds {
            let registered = self.registry.registered_kinds();
            let missing: Vec<TaskKind> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskKinds(missing));
            }
        }
        Ok(App {
            registry: self.registry,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct App {
    pub registry: TypedRegistry,
}

impl App {
    /// The three production handlers sharing one context.
    pub fn standard(ctx: Arc<ServiceContext>) -> Result<App, BuildError> {
        Ok(AppBuilder::new()
            .register::<UserReposTask, _>(UserReposHandler::new(ctx.clone()))?
            .register::<HookTask, _>(HookHandler::new(ctx.clone()))?
            .register::<CommitSearchTask, _>(CommitSearchHandler::new(ctx))?
            .expect_all_kinds()
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHost, TestEnv};

    #[test]
    fn standard_app_covers_every_kind() {
        let env = TestEnv::new(FakeHost::new());
        let app = App::standard(env.ctx.clone()).unwrap();
        assert_eq!(app.registry.registered_kinds(), TaskKind::ALL.to_vec());
    }

    #[test]
    fn missing_kinds_fail_the_build() {
        let env = TestEnv::new(FakeHost::new());
        let result = AppBuilder::new()
            .register::<HookTask, _>(HookHandler::new(env.ctx.clone()))
            .unwrap()
            .expect_all_kinds()
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingTaskKinds(missing))
                if missing == vec![TaskKind::UserRepos, TaskKind::CommitSearch]
        ));
    }

    #[test]
    fn no_expectations_builds() {
        assert!(AppBuilder::new().build().is_ok());
    }
}
