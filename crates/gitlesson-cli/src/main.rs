use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use gitlesson_core::admin::remove_hooks;
use gitlesson_core::app::{App, PoolConfig, ServiceContext, ServiceSettings, WorkerPool};
use gitlesson_core::config::Config;
use gitlesson_core::impls::{GitHubClient, InMemoryDocumentStore, InMemoryListStore, SqliteStore};
use gitlesson_core::ports::{DocumentStore, ListStore, SystemClock};
use gitlesson_core::queue::{Promoter, TaskStore};
use gitlesson_core::server::{AppState, build_router};

/// In-flight tasks get this long to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "gitlesson", version, about = "Collects lessons from commit messages")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server, the worker pool and the promoter.
    Serve {
        /// Overrides `server.listen`.
        #[arg(long)]
        listen: Option<String>,

        /// Overrides `store.sqlite_path`.
        #[arg(long)]
        sqlite_path: Option<PathBuf>,
    },
    /// Delete our webhook from every registered repository.
    RemoveHooks {
        #[arg(long)]
        sqlite_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve {
            listen,
            sqlite_path,
        } => {
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if sqlite_path.is_some() {
                config.store.sqlite_path = sqlite_path;
            }
            config.validate()?;
            serve(config).await
        }
        Command::RemoveHooks { sqlite_path } => {
            if sqlite_path.is_some() {
                config.store.sqlite_path = sqlite_path;
            }
            config.validate()?;
            let ctx = build_context(&config)?;
            let report = remove_hooks(&ctx).await?;
            println!(
                "removed {} hook(s), {} remote webhook(s) deleted",
                report.removed, report.remote_deleted
            );
            for (repo_id, error) in &report.failures {
                println!("  {repo_id}: {error}");
            }
            Ok(())
        }
    }
}

fn build_context(config: &Config) -> anyhow::Result<Arc<ServiceContext>> {
    let lists: Arc<dyn ListStore>;
    let documents: Arc<dyn DocumentStore>;
    match &config.store.sqlite_path {
        Some(path) => {
            let store = Arc::new(
                SqliteStore::open(path)
                    .with_context(|| format!("opening sqlite store {}", path.display()))?,
            );
            lists = store.clone();
            documents = store;
        }
        None => {
            warn!("no sqlite_path configured, state is kept in memory");
            lists = Arc::new(InMemoryListStore::new());
            documents = Arc::new(InMemoryDocumentStore::new());
        }
    }

    let host = GitHubClient::new(
        config.github.api_url.clone(),
        &config.github.user_agent,
        config.request_timeout(),
    )?;

    Ok(Arc::new(ServiceContext::new(
        Arc::new(TaskStore::new(lists, config.queue_keys())),
        documents,
        Arc::new(host),
        Arc::new(SystemClock),
        ServiceSettings::from_config(config),
    )))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let ctx = build_context(&config)?;
    let app = App::standard(ctx.clone())?;

    let pool = WorkerPool::new(
        ctx.tasks.clone(),
        app,
        PoolConfig {
            cap: config.worker_cap(),
            tickers: config.worker.tickers,
            poll_interval: config.poll_interval(),
            task_timeout: config.task_timeout(),
        },
    );
    let pool_handle = pool.spawn();

    let (promoter_tx, promoter_rx) = watch::channel(false);
    let promoter = Promoter::new(
        ctx.tasks.clone(),
        ctx.clock.clone(),
        config.promote_interval(),
    )
    .spawn(promoter_rx);

    let router = build_router(AppState::new(ctx, pool));
    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.listen))?;
    info!(%addr, cap = config.worker_cap(), tickers = config.worker.tickers, "listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = promoter_tx.send(true);
    if let Err(e) = promoter.await {
        warn!(error = %e, "promoter task ended abnormally");
    }
    let remaining = pool_handle.shutdown_and_join(SHUTDOWN_GRACE).await;
    if remaining > 0 {
        warn!(remaining, "shutdown grace elapsed with tasks still running");
    }
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
