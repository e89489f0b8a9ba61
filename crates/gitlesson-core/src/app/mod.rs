//! App - wiring of ports into the running service.
//!
//! - **ServiceContext**: collaborators shared by every handler
//! - **AppBuilder**: handler registration, fail-fast on missing kinds
//! - **WorkerPool**: capped dispatch from the task store
//! - **Status**: queue and pool counters

pub mod builder;
pub mod context;
pub mod status;
pub mod worker_pool;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::context::{ServiceContext, ServiceSettings};
pub use self::status::{PoolStatus, StatusReport};
pub use self::worker_pool::{PoolConfig, PoolHandle, TickResult, WorkerPool};
