//! Typed - typed task dispatch.
//!
//! The queue edge speaks the closed `Task` enum; handlers are written
//! against one payload type each.
//!
//! - **surface**: `TaskPayload`, `Handler<T>` (type-safe)
//! - **inside**: `DynHandler` (object-safe, type erasure)

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::TaskPayload;
