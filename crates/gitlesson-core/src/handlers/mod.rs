//! Task handlers, one per task kind.

pub mod commit_search;
pub mod hook;
pub mod user_repos;

pub use self::commit_search::CommitSearchHandler;
pub use self::hook::{HookHandler, generate_secret};
pub use self::user_repos::UserReposHandler;
