use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    ALL_INTERFACES_HOST, APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_DATE_TIME_LABEL,
    DEFAULT_DB_ADDRESS, DEFAULT_DB_NAME, DEFAULT_DB_PASSWORD, DEFAULT_DB_USER,
    DEFAULT_LISTEN_ADDRESS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_DECOMPRESSED_BYTES,
    DEFAULT_METRIC_FAMILY, DEFAULT_NAME_LABEL, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_SEND_TIMEOUT_SECS, DEFAULT_TABLE_NAME,
    DEFAULT_TELEMETRY_PATH, DEFAULT_WRITE_BODY_LIMIT, DEFAULT_WRITE_PATH, HEALTH_PATH,
    MYSQL_DEFAULT_PORT, POSTGRES_DEFAULT_PORT, STORE_DEFAULT_ACQUIRE_TIMEOUT_SECS,
    STORE_DEFAULT_MAX_CONNECTIONS,
};
use crate::data::validate_table_name;

// =============================================================================
// Store Driver Enum
// =============================================================================

/// Relational store backing the destination table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Mysql,
    Postgres,
    Sqlite,
}

impl StoreDriver {
    /// Default server port for network drivers
    pub fn default_port(self) -> Option<u16> {
        match self {
            StoreDriver::Mysql => Some(MYSQL_DEFAULT_PORT),
            StoreDriver::Postgres => Some(POSTGRES_DEFAULT_PORT),
            StoreDriver::Sqlite => None,
        }
    }
}

impl fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreDriver::Mysql => write!(f, "mysql"),
            StoreDriver::Postgres => write!(f, "postgres"),
            StoreDriver::Sqlite => write!(f, "sqlite"),
        }
    }
}

// =============================================================================
// Store Failure Policy Enum
// =============================================================================

/// Reaction to a failed store write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicyKind {
    /// Fail the request and stop the process
    #[default]
    Halt,
    /// Retry with exponential backoff, then halt
    Retry,
    /// Fail the request only; the sender is expected to resend
    Reject,
}

impl FailurePolicyKind {
    /// Whether a failed write stops ingestion for the rest of the process
    pub fn halts(self) -> bool {
        matches!(self, FailurePolicyKind::Halt | FailurePolicyKind::Retry)
    }
}

impl fmt::Display for FailurePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicyKind::Halt => write!(f, "halt"),
            FailurePolicyKind::Retry => write!(f, "retry"),
            FailurePolicyKind::Reject => write!(f, "reject"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub listen_address: Option<String>,
    pub telemetry_path: Option<String>,
    pub write_path: Option<String>,
    pub max_body_bytes: Option<usize>,
    pub max_decompressed_bytes: Option<usize>,
}

/// Retry configuration (nested under store)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

/// Store configuration section
#[derive(Default, Clone, Deserialize)]
pub struct StoreFileConfig {
    pub driver: Option<StoreDriver>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub table: Option<String>,
    pub max_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub failure_policy: Option<FailurePolicyKind>,
    pub retry: Option<RetryFileConfig>,
}

impl fmt::Debug for StoreFileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreFileConfig")
            .field("driver", &self.driver)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("failure_policy", &self.failure_policy)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Selector configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SelectorFileConfig {
    pub metric_family: Option<String>,
    pub date_time_label: Option<String>,
    pub name_label: Option<String>,
}

/// Root file config
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub store: Option<StoreFileConfig>,
    pub selector: Option<SelectorFileConfig>,
    pub log_level: Option<String>,
    pub send_timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.listen_address.is_some() {
                tracing::trace!(listen_address = ?server.listen_address, "Merging server.listen_address");
                current.listen_address = server.listen_address;
            }
            if server.telemetry_path.is_some() {
                tracing::trace!(telemetry_path = ?server.telemetry_path, "Merging server.telemetry_path");
                current.telemetry_path = server.telemetry_path;
            }
            if server.write_path.is_some() {
                tracing::trace!(write_path = ?server.write_path, "Merging server.write_path");
                current.write_path = server.write_path;
            }
            if server.max_body_bytes.is_some() {
                current.max_body_bytes = server.max_body_bytes;
            }
            if server.max_decompressed_bytes.is_some() {
                current.max_decompressed_bytes = server.max_decompressed_bytes;
            }
        }

        if let Some(store) = other.store {
            let current = self.store.get_or_insert_with(StoreFileConfig::default);
            if store.driver.is_some() {
                tracing::trace!(driver = ?store.driver, "Merging store.driver");
                current.driver = store.driver;
            }
            if store.address.is_some() {
                tracing::trace!(address = ?store.address, "Merging store.address");
                current.address = store.address;
            }
            if store.port.is_some() {
                current.port = store.port;
            }
            if store.name.is_some() {
                current.name = store.name;
            }
            if store.user.is_some() {
                tracing::trace!(user = "***", "Merging store.user");
                current.user = store.user;
            }
            if store.password.is_some() {
                tracing::trace!(password = "***", "Merging store.password");
                current.password = store.password;
            }
            if store.url.is_some() {
                tracing::trace!(url = "***", "Merging store.url");
                current.url = store.url;
            }
            if store.table.is_some() {
                current.table = store.table;
            }
            if store.max_connections.is_some() {
                current.max_connections = store.max_connections;
            }
            if store.acquire_timeout_secs.is_some() {
                current.acquire_timeout_secs = store.acquire_timeout_secs;
            }
            if store.failure_policy.is_some() {
                tracing::trace!(failure_policy = ?store.failure_policy, "Merging store.failure_policy");
                current.failure_policy = store.failure_policy;
            }
            if let Some(retry) = store.retry {
                let current_retry = current.retry.get_or_insert_with(RetryFileConfig::default);
                if retry.max_attempts.is_some() {
                    current_retry.max_attempts = retry.max_attempts;
                }
                if retry.base_delay_ms.is_some() {
                    current_retry.base_delay_ms = retry.base_delay_ms;
                }
            }
        }

        if let Some(selector) = other.selector {
            let current = self
                .selector
                .get_or_insert_with(SelectorFileConfig::default);
            if selector.metric_family.is_some() {
                tracing::trace!(metric_family = ?selector.metric_family, "Merging selector.metric_family");
                current.metric_family = selector.metric_family;
            }
            if selector.date_time_label.is_some() {
                current.date_time_label = selector.date_time_label;
            }
            if selector.name_label.is_some() {
                current.name_label = selector.name_label;
            }
        }

        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.send_timeout_secs.is_some() {
            self.send_timeout_secs = other.send_timeout_secs;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub telemetry_path: String,
    pub write_path: String,
    /// Limit on the compressed request body
    pub max_body_bytes: usize,
    /// Limit on the decompressed remote-write payload
    pub max_decompressed_bytes: usize,
}

/// How to reach the store
#[derive(Clone, PartialEq, Eq)]
pub enum StoreConnection {
    /// Full driver URL
    Url(String),
    /// Individual connection fields (sqlite only uses `name`, as a file path)
    Fields {
        address: String,
        port: u16,
        name: String,
        user: String,
        password: String,
    },
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConnection::Url(_) => f.write_str("Url(***)"),
            StoreConnection::Fields {
                address,
                port,
                name,
                user,
                ..
            } => f
                .debug_struct("Fields")
                .field("address", address)
                .field("port", port)
                .field("name", name)
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Store failure policy (final/runtime)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicyConfig {
    pub kind: FailurePolicyKind,
    /// Attempts per write under `retry` (including the first)
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for FailurePolicyConfig {
    fn default() -> Self {
        Self {
            kind: FailurePolicyKind::Halt,
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

/// Store configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub driver: StoreDriver,
    pub connection: StoreConnection,
    pub table: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub failure_policy: FailurePolicyConfig,
}

/// Selector configuration (final/runtime)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    pub metric_family: String,
    pub date_time_label: String,
    pub name_label: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            metric_family: DEFAULT_METRIC_FAMILY.to_string(),
            date_time_label: DEFAULT_DATE_TIME_LABEL.to_string(),
            name_label: DEFAULT_NAME_LABEL.to_string(),
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub selector: SelectorConfig,
    pub log_level: String,
    /// Accepted for compatibility with existing deployments; the write path does not use it
    pub send_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.promsql-bridge/promsql-bridge.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli.config, "CLI config path");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config)?;
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            write_path = %config.server.write_path,
            telemetry_path = %config.server.telemetry_path,
            driver = %config.store.driver,
            table = %config.store.table,
            failure_policy = %config.store.failure_policy.kind,
            metric_family = %config.selector.metric_family,
            send_timeout_secs = config.send_timeout.as_secs(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer defaults -> file config -> CLI/env overrides
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_store = file_config.store.unwrap_or_default();
        let file_retry = file_store.retry.clone().unwrap_or_default();
        let file_selector = file_config.selector.unwrap_or_default();

        let listen_address = cli
            .listen_address
            .clone()
            .or(file_server.listen_address)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
        let (host, port) = parse_listen_address(&listen_address)?;

        let server = ServerConfig {
            host,
            port,
            telemetry_path: cli
                .telemetry_path
                .clone()
                .or(file_server.telemetry_path)
                .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
            write_path: cli
                .write_path
                .clone()
                .or(file_server.write_path)
                .unwrap_or_else(|| DEFAULT_WRITE_PATH.to_string()),
            max_body_bytes: file_server
                .max_body_bytes
                .unwrap_or(DEFAULT_WRITE_BODY_LIMIT),
            max_decompressed_bytes: file_server
                .max_decompressed_bytes
                .unwrap_or(DEFAULT_MAX_DECOMPRESSED_BYTES),
        };

        let driver = cli.db_driver.or(file_store.driver).unwrap_or_default();

        // A URL wins over fields from its own layer or below, never over CLI fields
        let cli_fields_set = cli.db_address.is_some()
            || cli.db_port.is_some()
            || cli.db_name.is_some()
            || cli.db_user.is_some()
            || cli.db_password.is_some();
        let url = match (cli.db_url.clone(), file_store.url) {
            (Some(url), _) => Some(url),
            (None, Some(url)) if !cli_fields_set => Some(url),
            _ => None,
        };
        let connection = match url {
            Some(url) => StoreConnection::Url(url),
            None => StoreConnection::Fields {
                address: cli
                    .db_address
                    .clone()
                    .or(file_store.address)
                    .unwrap_or_else(|| DEFAULT_DB_ADDRESS.to_string()),
                port: cli
                    .db_port
                    .or(file_store.port)
                    .or(driver.default_port())
                    .unwrap_or_default(),
                name: cli
                    .db_name
                    .clone()
                    .or(file_store.name)
                    .unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
                user: cli
                    .db_user
                    .clone()
                    .or(file_store.user)
                    .unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
                password: cli
                    .db_password
                    .clone()
                    .or(file_store.password)
                    .unwrap_or_else(|| DEFAULT_DB_PASSWORD.to_string()),
            },
        };

        let failure_policy = FailurePolicyConfig {
            kind: cli
                .store_failure_policy
                .or(file_store.failure_policy)
                .unwrap_or_default(),
            max_attempts: file_retry
                .max_attempts
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            base_delay_ms: file_retry
                .base_delay_ms
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        };

        let store = StoreConfig {
            driver,
            connection,
            table: cli
                .db_table
                .clone()
                .or(file_store.table)
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            max_connections: file_store
                .max_connections
                .unwrap_or(STORE_DEFAULT_MAX_CONNECTIONS),
            acquire_timeout_secs: file_store
                .acquire_timeout_secs
                .unwrap_or(STORE_DEFAULT_ACQUIRE_TIMEOUT_SECS),
            failure_policy,
        };

        let selector = SelectorConfig {
            metric_family: cli
                .metric_family
                .clone()
                .or(file_selector.metric_family)
                .unwrap_or_else(|| DEFAULT_METRIC_FAMILY.to_string()),
            date_time_label: file_selector
                .date_time_label
                .unwrap_or_else(|| DEFAULT_DATE_TIME_LABEL.to_string()),
            name_label: file_selector
                .name_label
                .unwrap_or_else(|| DEFAULT_NAME_LABEL.to_string()),
        };

        let log_level = cli
            .log_level
            .clone()
            .or(file_config.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let send_timeout = cli.send_timeout.unwrap_or_else(|| {
            Duration::from_secs(
                file_config
                    .send_timeout_secs
                    .unwrap_or(DEFAULT_SEND_TIMEOUT_SECS),
            )
        });

        Ok(Self {
            server,
            store,
            selector,
            log_level,
            send_timeout,
        })
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: listen address host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: listen port must be greater than 0");
        }

        for (name, path) in [
            ("write_path", &self.server.write_path),
            ("telemetry_path", &self.server.telemetry_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!(
                    "Configuration error: server.{} must start with '/' (got '{}')",
                    name,
                    path
                );
            }
            if path == HEALTH_PATH {
                anyhow::bail!(
                    "Configuration error: server.{} collides with the health endpoint {}",
                    name,
                    HEALTH_PATH
                );
            }
        }
        if self.server.write_path == self.server.telemetry_path {
            anyhow::bail!(
                "Configuration error: write path and telemetry path cannot be the same ({})",
                self.server.write_path
            );
        }

        if self.server.max_body_bytes == 0 || self.server.max_decompressed_bytes == 0 {
            anyhow::bail!("Configuration error: body limits must be greater than 0");
        }

        validate_table_name(&self.store.table)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

        match &self.store.connection {
            StoreConnection::Url(url) if url.is_empty() => {
                anyhow::bail!("Configuration error: store.url must not be empty when set");
            }
            StoreConnection::Fields { name, .. } if name.is_empty() => {
                anyhow::bail!("Configuration error: store.name must not be empty");
            }
            StoreConnection::Fields { port, .. }
                if *port == 0 && self.store.driver != StoreDriver::Sqlite =>
            {
                anyhow::bail!(
                    "Configuration error: store.port must be greater than 0 for {}",
                    self.store.driver
                );
            }
            _ => {}
        }

        if self.store.max_connections == 0 {
            anyhow::bail!("Configuration error: store.max_connections must be greater than 0");
        }

        if self.store.failure_policy.max_attempts == 0 {
            anyhow::bail!("Configuration error: store.retry.max_attempts must be at least 1");
        }

        if self.selector.metric_family.is_empty() {
            anyhow::bail!("Configuration error: selector.metric_family must not be empty");
        }
        if self.selector.date_time_label.is_empty() || self.selector.name_label.is_empty() {
            anyhow::bail!("Configuration error: selector label names must not be empty");
        }

        if self.store.failure_policy.kind == FailurePolicyKind::Reject {
            tracing::warn!(
                "store.failure_policy is 'reject': store failures fail the request but ingestion continues"
            );
        }

        Ok(())
    }
}

/// Split a listen address into host and port.
///
/// Accepts `host:port`, `[v6]:port` and the `:port` shorthand for all interfaces.
pub fn parse_listen_address(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("Invalid listen address '{}': expected host:port", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port in listen address '{}'", addr))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() {
        ALL_INTERFACES_HOST
    } else {
        host
    };

    Ok((host.to_string(), port))
}

/// Get the profile config path (~/.promsql-bridge/promsql-bridge.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
