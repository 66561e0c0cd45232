use clap::{Parser, Subcommand};

use std::path::PathBuf;
use std::time::Duration;

use super::config::{FailurePolicyKind, StoreDriver};
use super::constants::{
    ENV_CONFIG, ENV_DB_ADDRESS, ENV_DB_DRIVER, ENV_DB_NAME, ENV_DB_PASSWORD, ENV_DB_PORT,
    ENV_DB_TABLE, ENV_DB_URL, ENV_DB_USER, ENV_LISTEN_ADDRESS, ENV_LOG_LEVEL, ENV_METRIC_FAMILY,
    ENV_SEND_TIMEOUT, ENV_STORE_FAILURE_POLICY, ENV_TELEMETRY_PATH, ENV_WRITE_PATH,
};

#[derive(Parser)]
#[command(name = "promsql-bridge")]
#[command(version, about = "Prometheus remote-write to SQL bridge", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Address to listen on for web endpoints (host:port or :port)
    #[arg(long = "web-listen-address", global = true, env = ENV_LISTEN_ADDRESS)]
    pub listen_address: Option<String>,

    /// Path under which to expose the bridge's own metrics
    #[arg(long = "web-telemetry-path", global = true, env = ENV_TELEMETRY_PATH)]
    pub telemetry_path: Option<String>,

    /// Path accepting remote-write pushes
    #[arg(long = "web-write-path", global = true, env = ENV_WRITE_PATH)]
    pub write_path: Option<String>,

    /// The log level to use (error, warn, info, debug, trace)
    #[arg(long, global = true, env = ENV_LOG_LEVEL)]
    pub log_level: Option<String>,

    /// The timeout to use when sending samples to the remote storage (e.g. 30s)
    #[arg(long = "adapter-send-timeout", global = true, env = ENV_SEND_TIMEOUT, value_parser = parse_duration)]
    pub send_timeout: Option<Duration>,

    /// Store driver (mysql, postgres or sqlite)
    #[arg(long, global = true, env = ENV_DB_DRIVER, value_parser = parse_store_driver)]
    pub db_driver: Option<StoreDriver>,

    /// Address of the database server
    #[arg(long, global = true, env = ENV_DB_ADDRESS)]
    pub db_address: Option<String>,

    /// Port of the database server
    #[arg(long, global = true, env = ENV_DB_PORT)]
    pub db_port: Option<u16>,

    /// Database name (file path for sqlite)
    #[arg(long, global = true, env = ENV_DB_NAME)]
    pub db_name: Option<String>,

    /// Database user
    #[arg(long, global = true, env = ENV_DB_USER)]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, global = true, env = ENV_DB_PASSWORD)]
    pub db_password: Option<String>,

    /// Full connection URL (overrides address, port, name and credentials)
    #[arg(long, global = true, env = ENV_DB_URL)]
    pub db_url: Option<String>,

    /// Destination table name
    #[arg(long, global = true, env = ENV_DB_TABLE)]
    pub db_table: Option<String>,

    /// Label-set substring identifying the tracked metric family
    #[arg(long, global = true, env = ENV_METRIC_FAMILY)]
    pub metric_family: Option<String>,

    /// What to do when the store rejects a write (halt, retry or reject)
    #[arg(long, global = true, env = ENV_STORE_FAILURE_POLICY, value_parser = parse_failure_policy)]
    pub store_failure_policy: Option<FailurePolicyKind>,
}

/// Parse store driver from CLI/env string
fn parse_store_driver(s: &str) -> Result<StoreDriver, String> {
    match s.to_lowercase().as_str() {
        "mysql" => Ok(StoreDriver::Mysql),
        "postgres" | "postgresql" => Ok(StoreDriver::Postgres),
        "sqlite" => Ok(StoreDriver::Sqlite),
        _ => Err(format!(
            "Invalid store driver '{}'. Valid options: mysql, postgres, sqlite",
            s
        )),
    }
}

/// Parse store failure policy from CLI/env string
fn parse_failure_policy(s: &str) -> Result<FailurePolicyKind, String> {
    match s.to_lowercase().as_str() {
        "halt" => Ok(FailurePolicyKind::Halt),
        "retry" => Ok(FailurePolicyKind::Retry),
        "reject" => Ok(FailurePolicyKind::Reject),
        _ => Err(format!(
            "Invalid store failure policy '{}'. Valid options: halt, retry, reject",
            s
        )),
    }
}

/// Parse a duration ("500ms", "30s", "5m", "1h"); a bare number means seconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration '{}'", s))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        "h" => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(format!(
            "Invalid duration unit in '{}'. Valid units: ms, s, m, h",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Create the destination table and unique index, then exit
    InitSchema,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub listen_address: Option<String>,
    pub telemetry_path: Option<String>,
    pub write_path: Option<String>,
    pub log_level: Option<String>,
    pub send_timeout: Option<Duration>,
    pub db_driver: Option<StoreDriver>,
    pub db_address: Option<String>,
    pub db_port: Option<u16>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_url: Option<String>,
    pub db_table: Option<String>,
    pub metric_family: Option<String>,
    pub store_failure_policy: Option<FailurePolicyKind>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        listen_address: cli.listen_address,
        telemetry_path: cli.telemetry_path,
        write_path: cli.write_path,
        log_level: cli.log_level,
        send_timeout: cli.send_timeout,
        db_driver: cli.db_driver,
        db_address: cli.db_address,
        db_port: cli.db_port,
        db_name: cli.db_name,
        db_user: cli.db_user,
        db_password: cli.db_password,
        db_url: cli.db_url,
        db_table: cli.db_table,
        metric_family: cli.metric_family,
        store_failure_policy: cli.store_failure_policy,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("1.5s").is_err());
    }

    #[test]
    fn test_parse_store_driver() {
        assert_eq!(parse_store_driver("MySQL").unwrap(), StoreDriver::Mysql);
        assert_eq!(parse_store_driver("postgresql").unwrap(), StoreDriver::Postgres);
        assert_eq!(parse_store_driver("sqlite").unwrap(), StoreDriver::Sqlite);
        assert!(parse_store_driver("oracle").is_err());
    }

    #[test]
    fn test_parse_failure_policy() {
        assert_eq!(parse_failure_policy("halt").unwrap(), FailurePolicyKind::Halt);
        assert_eq!(parse_failure_policy("RETRY").unwrap(), FailurePolicyKind::Retry);
        assert_eq!(parse_failure_policy("reject").unwrap(), FailurePolicyKind::Reject);
        assert!(parse_failure_policy("ignore").is_err());
    }

    #[test]
    fn test_cli_accepts_web_and_db_flags() {
        let cli = Cli::try_parse_from([
            "promsql-bridge",
            "--web-listen-address",
            ":9300",
            "--web-telemetry-path",
            "/telemetry",
            "--adapter-send-timeout",
            "10s",
            "--db-driver",
            "postgres",
            "--db-port",
            "5433",
        ])
        .unwrap();

        assert_eq!(cli.listen_address.as_deref(), Some(":9300"));
        assert_eq!(cli.telemetry_path.as_deref(), Some("/telemetry"));
        assert_eq!(cli.send_timeout, Some(Duration::from_secs(10)));
        assert_eq!(cli.db_driver, Some(StoreDriver::Postgres));
        assert_eq!(cli.db_port, Some(5433));
        assert!(cli.command.is_none());
    }
}
