//! TypedRegistry - handler lookup by task kind.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::TaskPayload;
use crate::domain::TaskKind;

/// Handlers registered per `TaskKind`.
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<HookTask, _>(HookHandler::new(ctx))?;
/// let handler = registry.get(TaskKind::Hook);
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<TaskKind, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for task kind '{0}' is already registered")]
    AlreadyRegistered(TaskKind),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: TaskPayload, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&T::KIND) {
            return Err(RegistryError::AlreadyRegistered(T::KIND));
        }
        self.handlers
            .insert(T::KIND, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}
