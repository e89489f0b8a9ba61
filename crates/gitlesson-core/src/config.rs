//! TOML configuration. Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::queue::QueueKeys;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub github: GithubConfig,
    pub worker: WorkerConfig,
    pub scheduler: SchedulerConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Public URL the host delivers push events to.
    pub callback_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            callback_url: "http://localhost:3000/hook".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Absent means everything lives in memory.
    pub sqlite_path: Option<PathBuf>,
    pub tasks_list: String,
    pub dead_letter_list: String,
    pub delayed_hash: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let keys = QueueKeys::default();
        Self {
            sqlite_path: None,
            tasks_list: keys.tasks,
            dead_letter_list: keys.dead_letter,
            delayed_hash: keys.delayed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub required_scopes: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: "gitlesson".into(),
            required_scopes: vec![
                "user:email".into(),
                "read:org".into(),
                "admin:repo_hook".into(),
            ],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Independent pollers competing for the same queue.
    pub tickers: usize,
    pub workers_per_core: usize,
    /// Overrides `available_parallelism * workers_per_core`.
    pub max_in_flight: Option<usize>,
    pub poll_interval_ms: u64,
    pub task_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tickers: 2,
            workers_per_core: 4,
            max_in_flight: None,
            poll_interval_ms: 250,
            task_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub promote_interval_secs: u64,
    /// Delay before a user's repositories are scanned again.
    pub refresh_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            promote_interval_secs: 5,
            refresh_interval_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub commit_page_size: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            commit_page_size: 100,
        }
    }
}

impl Config {
    /// Read `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.worker.tickers == 0, "worker.tickers must be at least 1"),
            (self.worker.poll_interval_ms == 0, "worker.poll_interval_ms must be non-zero"),
            (self.worker.task_timeout_secs == 0, "worker.task_timeout_secs must be non-zero"),
            (self.worker.max_in_flight == Some(0), "worker.max_in_flight must be non-zero"),
            (self.scan.commit_page_size == 0, "scan.commit_page_size must be non-zero"),
            (
                self.github.request_timeout_secs == 0,
                "github.request_timeout_secs must be non-zero",
            ),
            (
                self.scheduler.promote_interval_secs == 0,
                "scheduler.promote_interval_secs must be non-zero",
            ),
            (self.server.callback_url.is_empty(), "server.callback_url is required"),
            (
                self.store.tasks_list.is_empty()
                    || self.store.dead_letter_list.is_empty()
                    || self.store.delayed_hash.is_empty(),
                "store list names must not be empty",
            ),
            (
                self.store.tasks_list == self.store.dead_letter_list,
                "store.tasks_list and store.dead_letter_list must differ",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(ConfigError::Invalid((*msg).to_string())),
            None => Ok(()),
        }
    }

    /// Concurrency cap for the worker pool.
    pub fn worker_cap(&self) -> usize {
        self.worker
            .max_in_flight
            .unwrap_or_else(|| {
                let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
                cores * self.worker.workers_per_core
            })
            .max(1)
    }

    pub fn queue_keys(&self) -> QueueKeys {
        QueueKeys {
            tasks: self.store.tasks_list.clone(),
            dead_letter: self.store.dead_letter_list.clone(),
            delayed: self.store.delayed_hash.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker.poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.task_timeout_secs)
    }

    pub fn promote_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.promote_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.github.request_timeout_secs)
    }
}
