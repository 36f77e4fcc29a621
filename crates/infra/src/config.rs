//! Process configuration, read from environment variables once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use almacen_inventory::StockPolicy;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Which store backs the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres { database_url: String, max_connections: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub store: StoreConfig,
    pub stock_policy: StockPolicy,
    pub cors_origin: String,
    /// Directory uploaded product images are written to.
    pub images_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", &raw, e))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let ttl_minutes = match get("TOKEN_TTL_MINUTES") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(minutes) if minutes > 0 => minutes,
                Ok(_) => return Err(ConfigError::invalid("TOKEN_TTL_MINUTES", &raw, "must be positive")),
                Err(e) => return Err(ConfigError::invalid("TOKEN_TTL_MINUTES", &raw, e)),
            },
            None => 24 * 60,
        };

        let use_persistent = match get("USE_PERSISTENT_STORES") {
            Some(raw) => raw
                .trim()
                .to_ascii_lowercase()
                .parse::<bool>()
                .map_err(|e| ConfigError::invalid("USE_PERSISTENT_STORES", &raw, e))?,
            None => false,
        };
        let store = if use_persistent {
            let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::invalid("DATABASE_MAX_CONNECTIONS", &raw, e))?,
                None => 10,
            };
            StoreConfig::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreConfig::InMemory
        };

        let stock_policy = match get("STOCK_POLICY") {
            Some(raw) => raw
                .parse::<StockPolicy>()
                .map_err(|e| ConfigError::invalid("STOCK_POLICY", &raw, e))?,
            None => StockPolicy::default(),
        };

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());
        let images_dir = PathBuf::from(get("IMAGES_DIR").unwrap_or_else(|| "images".to_string()));

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl: chrono::Duration::minutes(ttl_minutes),
            store,
            stock_policy,
            cors_origin,
            images_dir,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
