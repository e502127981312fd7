use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use worldfleet_reconcile::{DEFAULT_PAGE_SIZE, DEFAULT_RECONCILE_INTERVAL};

use crate::controller::ControllerConfig;
use crate::db::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,

    /// Run against an in-memory registry and a simulated host.
    pub dev_mode: bool,

    /// JSON array of world configurations served in dev mode.
    pub dev_configs_path: Option<PathBuf>,

    pub database: DbConfig,
    pub host_api_url: String,
    pub host_timeout: Duration,
    pub reconcile_interval: Duration,
    pub controller: ControllerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("WORLDFLEET_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .context("invalid WORLDFLEET_LISTEN_ADDR")?;

        let log_level =
            std::env::var("WORLDFLEET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("WORLDFLEET_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let dev_configs_path = std::env::var("WORLDFLEET_DEV_CONFIGS").ok().map(PathBuf::from);

        let db_defaults = DbConfig::default();
        let database = DbConfig {
            database_url: std::env::var("DATABASE_URL").unwrap_or(db_defaults.database_url),
            max_connections: env_u32(
                "DB_MAX_CONNECTIONS",
                db_defaults.max_connections,
            )?,
            min_connections: env_u32(
                "DB_MIN_CONNECTIONS",
                db_defaults.min_connections,
            )?,
            migrations_dir: std::env::var("WORLDFLEET_MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(db_defaults.migrations_dir),
            ..db_defaults
        };
        if database.min_connections > database.max_connections {
            bail!("DB_MIN_CONNECTIONS must not exceed DB_MAX_CONNECTIONS");
        }

        let host_api_url =
            std::env::var("HOST_API_URL").unwrap_or_else(|_| "http://127.0.0.1:9080".to_string());
        let host_timeout = Duration::from_secs(env_number("HOST_TIMEOUT_SECS", 10)?);

        let reconcile_interval = Duration::from_secs(env_number(
            "RECONCILE_INTERVAL_SECS",
            DEFAULT_RECONCILE_INTERVAL.as_secs(),
        )?);
        if reconcile_interval.is_zero() {
            bail!("RECONCILE_INTERVAL_SECS must be greater than zero");
        }

        let page_size = env_number("PAGE_SIZE", u64::from(DEFAULT_PAGE_SIZE))?;
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|n| *n > 0)
            .context("PAGE_SIZE must be between 1 and 4294967295")?;

        let defaults = ControllerConfig::default();
        let fleet_alias = match std::env::var("FLEET_ALIAS") {
            Ok(alias) => alias,
            Err(_) if dev_mode => "dev-fleet".to_string(),
            Err(_) => bail!("FLEET_ALIAS is required"),
        };

        let controller = ControllerConfig {
            fleet_alias,
            fleet_role_arn: std::env::var("FLEET_ROLE_ARN").unwrap_or_default(),
            config_table: std::env::var("WORLD_CONFIGURATIONS_TABLE")
                .unwrap_or(defaults.config_table),
            player_data_table: std::env::var("WORLD_PLAYER_DATA_TABLE")
                .unwrap_or(defaults.player_data_table),
            page_size,
            ..defaults
        };

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            dev_configs_path,
            database,
            host_api_url,
            host_timeout,
            reconcile_interval,
            controller,
        })
    }
}

fn env_number(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {name}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn env_u32(name: &str, default: u32) -> Result<u32> {
    let value = env_number(name, u64::from(default))?;
    u32::try_from(value).with_context(|| format!("{name} out of range: {value}"))
}
