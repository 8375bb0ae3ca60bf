// Configuration loading for the server
// Sources, lowest precedence first: conf/application.yml, environment, CLI

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use url::Url;

use pantry_common::{PantryError, Result};

pub const DB_HOST: &str = "db_host";
pub const DB_PORT: &str = "db_port";
pub const DB_USER: &str = "db_user";
pub const DB_PASSWORD: &str = "db_password";
pub const DB_NAME: &str = "db_name";
pub const DB_SSLMODE: &str = "db_sslmode";
pub const DB_URL: &str = "db.url";
pub const SERVER_PORT: &str = "server_port";
pub const SYNC_PORT: &str = "sync_port";
pub const HOSTNAME: &str = "hostname";

const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "pantry-server", version, about = "Replicated in-memory key/value cache")]
struct Cli {
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long = "server-port")]
    server_port: Option<u16>,
    #[arg(long = "sync-port")]
    sync_port: Option<u16>,
    #[arg(long = "hostname")]
    hostname: Option<String>,
}

/// Validated values every node needs before it can open a listener
#[derive(Clone)]
pub struct NodeSettings {
    pub hostname: String,
    pub server_port: u16,
    pub sync_port: u16,
    pub database_url: String,
}

impl NodeSettings {
    /// Database URL with the password masked, safe for logs
    pub fn redacted_database_url(&self) -> String {
        match Url::parse(&self.database_url) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("***"));
                url.to_string()
            }
            Ok(url) => url.to_string(),
            Err(_) => "<unparsable>".to_string(),
        }
    }
}

impl std::fmt::Debug for NodeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSettings")
            .field("hostname", &self.hostname)
            .field("server_port", &self.server_port)
            .field("sync_port", &self.sync_port)
            .field("database_url", &self.redacted_database_url())
            .finish()
    }
}

/// HTTP listener tunables shared by the main and sync servers
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    pub address: String,
    pub shutdown_timeout: Duration,
    pub max_body_bytes: usize,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration from the command line, environment, and config file
    pub fn new() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(args: Cli) -> Result<Self> {
        Self::load(args, Environment::default())
    }

    // Environment values stay strings; typed getters parse them on read
    fn load(args: Cli, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name(&args.config_file).required(false))
            .add_source(environment.separator("__"));

        if let Some(v) = args.database_url {
            builder = builder.set_override(DB_URL, v).map_err(config_error)?;
        }
        if let Some(v) = args.server_port {
            builder = builder
                .set_override(SERVER_PORT, i64::from(v))
                .map_err(config_error)?;
        }
        if let Some(v) = args.sync_port {
            builder = builder
                .set_override(SYNC_PORT, i64::from(v))
                .map_err(config_error)?;
        }
        if let Some(v) = args.hostname {
            builder = builder.set_override(HOSTNAME, v).map_err(config_error)?;
        }

        let config = builder.build().map_err(config_error)?;
        Ok(Configuration { config })
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    fn non_empty_string(&self, key: &str) -> Option<String> {
        self.config
            .get_string(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn port(&self, key: &str) -> Option<u16> {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| *v > 0)
    }

    /// Check every required key in one pass and return the node settings.
    ///
    /// The error lists all missing or invalid keys at once.
    pub fn validate(&self) -> Result<NodeSettings> {
        let mut missing: Vec<&str> = Vec::new();

        let hostname = self.non_empty_string(HOSTNAME).or_else(os_hostname);
        if hostname.is_none() {
            missing.push(HOSTNAME);
        }

        let server_port = self.port(SERVER_PORT);
        if server_port.is_none() {
            missing.push(SERVER_PORT);
        }
        let sync_port = self.port(SYNC_PORT);
        if sync_port.is_none() {
            missing.push(SYNC_PORT);
        }

        let database_url = match self.non_empty_string(DB_URL) {
            Some(url) => Some(url),
            None => {
                for key in [DB_HOST, DB_USER, DB_PASSWORD, DB_NAME] {
                    if self.non_empty_string(key).is_none() {
                        missing.push(key);
                    }
                }
                if self.port(DB_PORT).is_none() {
                    missing.push(DB_PORT);
                }
                if missing.is_empty() {
                    Some(self.build_database_url()?)
                } else {
                    None
                }
            }
        };

        match (hostname, server_port, sync_port, database_url) {
            (Some(hostname), Some(server_port), Some(sync_port), Some(database_url))
                if missing.is_empty() =>
            {
                if server_port == sync_port {
                    return Err(PantryError::Configuration(format!(
                        "{SERVER_PORT} and {SYNC_PORT} must differ, both are {server_port}"
                    )));
                }
                Ok(NodeSettings {
                    hostname,
                    server_port,
                    sync_port,
                    database_url,
                })
            }
            _ => Err(PantryError::Configuration(format!(
                "missing or invalid required configuration: {}",
                missing.join(", ")
            ))),
        }
    }

    fn build_database_url(&self) -> Result<String> {
        let host = self.non_empty_string(DB_HOST).unwrap_or_default();
        let port = self.port(DB_PORT).unwrap_or(5432);
        let name = self.non_empty_string(DB_NAME).unwrap_or_default();
        let user = self.non_empty_string(DB_USER).unwrap_or_default();
        let password = self.config.get_string(DB_PASSWORD).unwrap_or_default();
        let sslmode = self
            .non_empty_string(DB_SSLMODE)
            .unwrap_or_else(|| "disable".to_string());

        let mut url = Url::parse(&format!("postgres://{host}:{port}/{name}")).map_err(|e| {
            PantryError::Configuration(format!("invalid database host or name: {e}"))
        })?;
        url.set_username(&user)
            .map_err(|_| PantryError::Configuration("invalid database user".to_string()))?;
        url.set_password(Some(&password))
            .map_err(|_| PantryError::Configuration("invalid database password".to_string()))?;
        url.query_pairs_mut().append_pair("sslmode", &sslmode);

        Ok(url.to_string())
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn http_server_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            address: self
                .non_empty_string("server.address")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            shutdown_timeout: Duration::from_secs(
                self.config
                    .get_int("server.shutdown_timeout_secs")
                    .unwrap_or(30)
                    .max(0) as u64,
            ),
            max_body_bytes: self
                .config
                .get_int("server.max_body_bytes")
                .unwrap_or(4 * 1024 * 1024)
                .max(1) as usize,
        }
    }

    // ========================================================================
    // Database Configuration
    // ========================================================================

    /// Whether the `workers` table is created at startup
    pub fn ensure_schema(&self) -> bool {
        self.config.get_bool("db.ensure_schema").unwrap_or(true)
    }

    /// Integer pool setting clamped to `min..=u32::MAX`
    fn pool_setting(&self, key: &str, default: i64, min: i64) -> u64 {
        self.config
            .get_int(key)
            .unwrap_or(default)
            .clamp(min, i64::from(u32::MAX)) as u64
    }

    pub async fn database_connection(&self, settings: &NodeSettings) -> Result<DatabaseConnection> {
        let max_connections = self.pool_setting("db.pool.max_connections", 10, 1) as u32;
        let min_connections = self.pool_setting("db.pool.min_connections", 1, 0) as u32;
        let connect_timeout = self.pool_setting("db.pool.connect_timeout_secs", 30, 1);
        let acquire_timeout = self.pool_setting("db.pool.acquire_timeout_secs", 8, 1);
        let idle_timeout = self.pool_setting("db.pool.idle_timeout_secs", 600, 0);
        let max_lifetime = self.pool_setting("db.pool.max_lifetime_secs", 1800, 0);
        let sqlx_logging = self
            .config
            .get_bool("db.pool.sqlx_logging")
            .unwrap_or(false);

        let mut opt = ConnectOptions::new(settings.database_url.clone());

        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .acquire_timeout(Duration::from_secs(acquire_timeout))
            .idle_timeout(Duration::from_secs(idle_timeout))
            .max_lifetime(Duration::from_secs(max_lifetime))
            .sqlx_logging(sqlx_logging)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        tracing::info!(
            database = %settings.redacted_database_url(),
            max_connections = max_connections,
            min_connections = min_connections,
            connect_timeout = connect_timeout,
            idle_timeout = idle_timeout,
            max_lifetime = max_lifetime,
            sqlx_logging = sqlx_logging,
            "Database connection pool configured"
        );

        Database::connect(opt)
            .await
            .map_err(|e| PantryError::Persistence(format!("failed to connect to database: {e}")))
    }

    pub fn to_core_config(&self) -> pantry_core::Configuration {
        pantry_core::Configuration::from_config(self.config.clone())
    }
}

fn config_error(e: config::ConfigError) -> PantryError {
    PantryError::Configuration(e.to_string())
}

fn os_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
}
