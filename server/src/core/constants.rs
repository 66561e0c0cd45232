// =============================================================================
// Application Identity
// =============================================================================

/// Tracing target of the library crate (module path root)
pub const LOG_TARGET: &str = "promsql_bridge";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".promsql-bridge";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "promsql-bridge.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "PROMSQL_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for the listen address (`host:port` or `:port`)
pub const ENV_LISTEN_ADDRESS: &str = "PROMSQL_LISTEN_ADDRESS";

/// Environment variable for the telemetry (metrics exposition) path
pub const ENV_TELEMETRY_PATH: &str = "PROMSQL_TELEMETRY_PATH";

/// Environment variable for the remote-write path
pub const ENV_WRITE_PATH: &str = "PROMSQL_WRITE_PATH";

/// Environment variable for log level/filter (takes precedence over RUST_LOG)
pub const ENV_LOG: &str = "PROMSQL_LOG";

/// Environment variable for the log level flag fallback
pub const ENV_LOG_LEVEL: &str = "PROMSQL_LOG_LEVEL";

/// Environment variable for the send timeout
pub const ENV_SEND_TIMEOUT: &str = "PROMSQL_SEND_TIMEOUT";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default listen address (`:port` binds all interfaces)
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9201";

/// Host used when the listen address omits one
pub const ALL_INTERFACES_HOST: &str = "0.0.0.0";

/// Default telemetry path
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Default remote-write path
pub const DEFAULT_WRITE_PATH: &str = "/write";

/// Health endpoint path
pub const HEALTH_PATH: &str = "/api/v1/health";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default send timeout in seconds (accepted, not used by the write path)
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Body Limits
// =============================================================================

/// Body limit for non-ingestion endpoints
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default compressed body limit for the remote-write endpoint (32MB)
pub const DEFAULT_WRITE_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Default limit on the decompressed remote-write payload (128MB)
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 128 * 1024 * 1024;

// =============================================================================
// Environment Variables - Store
// =============================================================================

pub const ENV_DB_DRIVER: &str = "PROMSQL_DB_DRIVER";
pub const ENV_DB_ADDRESS: &str = "PROMSQL_DB_ADDRESS";
pub const ENV_DB_PORT: &str = "PROMSQL_DB_PORT";
pub const ENV_DB_NAME: &str = "PROMSQL_DB_NAME";
pub const ENV_DB_USER: &str = "PROMSQL_DB_USER";
pub const ENV_DB_PASSWORD: &str = "PROMSQL_DB_PASSWORD";
pub const ENV_DB_URL: &str = "PROMSQL_DB_URL";
pub const ENV_DB_TABLE: &str = "PROMSQL_DB_TABLE";
pub const ENV_STORE_FAILURE_POLICY: &str = "PROMSQL_STORE_FAILURE_POLICY";

// =============================================================================
// Store Defaults
// =============================================================================

pub const DEFAULT_DB_ADDRESS: &str = "localhost";
pub const DEFAULT_DB_NAME: &str = "monitoring";
pub const DEFAULT_DB_USER: &str = "monitoring";
pub const DEFAULT_DB_PASSWORD: &str = "monitoring";

/// Default destination table
pub const DEFAULT_TABLE_NAME: &str = "monitoring";

pub const MYSQL_DEFAULT_PORT: u16 = 3306;
pub const POSTGRES_DEFAULT_PORT: u16 = 5432;

/// Default maximum pool connections
pub const STORE_DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds
pub const STORE_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// Interval between store health checks
pub const STORE_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;

/// Default maximum attempts for the `retry` failure policy
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default base delay in milliseconds for the `retry` failure policy
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

// =============================================================================
// Selector Defaults
// =============================================================================

pub const ENV_METRIC_FAMILY: &str = "PROMSQL_METRIC_FAMILY";

/// Substring identifying the tracked metric family
pub const DEFAULT_METRIC_FAMILY: &str = "simba_metric";

/// Label carrying the date/time field
pub const DEFAULT_DATE_TIME_LABEL: &str = "date_time";

/// Label carrying the column/series name
pub const DEFAULT_NAME_LABEL: &str = "column_name";

// =============================================================================
// Shutdown
// =============================================================================

/// Max time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Self-Observability
// =============================================================================

/// Remote-write requests by outcome (`ok`, `bad_request`, `store_error`)
pub const METRIC_WRITE_REQUESTS: &str = "promsql_write_requests_total";

/// Samples seen in decoded requests
pub const METRIC_SAMPLES_RECEIVED: &str = "promsql_samples_received_total";

/// Samples not persisted, by reason
pub const METRIC_SAMPLES_DROPPED: &str = "promsql_samples_dropped_total";

pub const METRIC_ROWS_INSERTED: &str = "promsql_rows_inserted_total";
pub const METRIC_ROWS_DUPLICATE: &str = "promsql_rows_duplicate_total";
pub const METRIC_STORE_ERRORS: &str = "promsql_store_errors_total";

/// Request latency histogram, by route path
pub const METRIC_HTTP_REQUEST_DURATION: &str = "promsql_http_request_duration_seconds";
