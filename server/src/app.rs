//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::api::ApiServer;
use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{DEFAULT_LOG_LEVEL, ENV_LOG, LOG_TARGET};
use crate::core::shutdown::ShutdownService;
use crate::data::StoreService;
use crate::domain::IngestPipeline;
use crate::domain::samples::{RowWriter, Selector};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub store: Arc<StoreService>,
    pub pipeline: IngestPipeline,
    pub metrics: PrometheusHandle,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        let filter_handle = Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let config = AppConfig::load(&cli_config)?;
        Self::apply_log_level(&filter_handle, &config.log_level);

        match command {
            Some(Commands::InitSchema) => Self::init_schema(&config).await,
            Some(Commands::Start) | None => {
                let app = Self::init(config).await?;
                Self::start_server(app).await
            }
        }
    }

    async fn connect_store(config: &AppConfig) -> Result<Arc<StoreService>> {
        let store = StoreService::init(&config.store).await.with_context(|| {
            format!("Failed to connect to {} store", config.store.driver)
        })?;
        store
            .repository()
            .ensure_schema()
            .await
            .with_context(|| format!("Failed to bootstrap table '{}'", config.store.table))?;
        Ok(Arc::new(store))
    }

    /// `init-schema` command: bootstrap the table and exit
    async fn init_schema(config: &AppConfig) -> Result<()> {
        let store = Self::connect_store(config).await?;
        let rows = store.repository().count_rows().await?;
        tracing::info!(
            driver = %config.store.driver,
            table = %config.store.table,
            rows,
            "Schema ready"
        );
        store.close().await;
        Ok(())
    }

    async fn init(config: AppConfig) -> Result<Self> {
        let metrics = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install metrics recorder")?;

        let store = Self::connect_store(&config).await?;
        tracing::debug!(
            driver = %store.driver(),
            table = %config.store.table,
            policy = %config.store.failure_policy.kind,
            "Store initialized"
        );

        let shutdown = ShutdownService::new(store.clone());
        let pipeline = IngestPipeline::new(
            Selector::new(config.selector.clone()),
            RowWriter::new(store.repository(), config.store.failure_policy),
            shutdown.clone(),
        );

        Ok(Self {
            shutdown,
            config,
            store,
            pipeline,
            metrics,
        })
    }

    /// Install the global subscriber; the filter is replaced once the config is loaded
    fn init_logging() -> FilterHandle {
        let filter =
            Self::env_filter().unwrap_or_else(|| EnvFilter::new(default_log_filter()));
        let (filter, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_level(true)
                    .with_ansi(true)
                    .compact(),
            )
            .init();

        handle
    }

    /// `PROMSQL_LOG`, then `RUST_LOG`
    fn env_filter() -> Option<EnvFilter> {
        std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .map(EnvFilter::new)
    }

    /// The configured level applies only when no filter came from the environment
    fn apply_log_level(handle: &FilterHandle, level: &str) {
        if Self::env_filter().is_some() {
            return;
        }
        if let Err(e) = handle.reload(EnvFilter::new(level)) {
            tracing::warn!(error = %e, level, "Failed to apply log level");
        }
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        let health_handle = app.store.start_health_check_task(app.shutdown.subscribe());
        app.shutdown.register(health_handle).await;

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        if let Some(reason) = app.shutdown.fatal_reason() {
            anyhow::bail!("Stopped after store failure: {}", reason);
        }
        Ok(())
    }
}

/// Filter used until the configuration is loaded
fn default_log_filter() -> String {
    format!("{},{}={}", DEFAULT_LOG_LEVEL, LOG_TARGET, DEFAULT_LOG_LEVEL)
}
