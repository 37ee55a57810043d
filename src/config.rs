use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cluster::Role;

/// Upper bound for inter-node token lifetimes (one day)
pub const MAX_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Name this node identifies itself with in inter-node tokens
    pub name: String,
    /// Fixed for the lifetime of the process
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Static key gating the admin endpoints (master only)
    pub admin_api_key: Option<String>,
    /// Shared HS256 secret for inter-node tokens
    pub jwt_secret: String,
    pub token_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum StorageBackend {
    Memory,
    #[default]
    Redb,
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// JSON file upserted into the stores at master start-up
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub cache_ttl_seconds: u64,
    /// Base URL of the master, e.g. `https://master.example.net:5000` (client only)
    pub master_api: Option<String>,
    /// Oldest cached snapshot still served while the master is unreachable.
    /// `None` serves stale data indefinitely.
    pub max_stale_seconds: Option<u64>,
    pub retry_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_api_key: None,
            jwt_secret: String::new(),
            token_ttl_seconds: 300, // 5 minutes
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            master_api: None,
            max_stale_seconds: None,
            retry_seconds: 5,
            timeout_seconds: 5,
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let role = match var("NODE_ROLE").or_else(|| var("NODE_TYPE")) {
            Some(value) => value.parse().map_err(ConfigError::ValidationError)?,
            None => Role::Client,
        };

        let name = var("NODE_NAME").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".to_string());

        let data_dir = var("DATA_DIR").unwrap_or_else(|| "./data".to_string());

        let backend = match var("STORAGE_BACKEND").map(|s| s.to_lowercase()).as_deref() {
            None | Some("redb") => StorageBackend::Redb,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown STORAGE_BACKEND '{other}' (expected 'redb' or 'memory')"
                )))
            }
        };

        let parse_secs = |key: &str| -> Result<Option<u64>, ConfigError> {
            var(key)
                .map(|s| {
                    s.trim().parse().map_err(|_| {
                        ConfigError::ValidationError(format!("{key} must be a number of seconds"))
                    })
                })
                .transpose()
        };

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            cache_ttl_seconds: match parse_secs("CACHE_TTL_SECONDS")? {
                Some(secs) => secs,
                None => parse_secs("CACHE_TTL")?.unwrap_or(defaults.cache_ttl_seconds),
            },
            master_api: var("MASTER_API").map(|s| s.trim_end_matches('/').to_string()),
            max_stale_seconds: parse_secs("MAX_STALE_SECONDS")?,
            retry_seconds: parse_secs("SYNC_RETRY_SECONDS")?.unwrap_or(defaults.retry_seconds),
            timeout_seconds: parse_secs("SYNC_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.timeout_seconds),
        };

        let auth = AuthConfig {
            admin_api_key: var("ADMIN_API_KEY").or_else(|| var("API_KEY")),
            jwt_secret: var("JWT_SECRET").unwrap_or_default(),
            token_ttl_seconds: parse_secs("TOKEN_TTL_SECONDS")?
                .unwrap_or(AuthConfig::default().token_ttl_seconds),
        };

        let config = Config {
            auth,
            node: NodeConfig {
                bind_address,
                data_dir,
                name,
                role,
            },
            storage: StorageConfig {
                backend,
                seed_file: var("SEED_FILE").map(PathBuf::from),
            },
            sync,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "NODE_NAME cannot be empty".to_string(),
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET must be set".to_string(),
            ));
        }

        if self.auth.token_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "TOKEN_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.auth.token_ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "TOKEN_TTL_SECONDS must be at most {MAX_TOKEN_TTL_SECONDS}"
            )));
        }

        match self.node.role {
            Role::Master => {
                if self.auth.admin_api_key.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::ValidationError(
                        "ADMIN_API_KEY must be set on a master node".to_string(),
                    ));
                }
            }
            Role::Client => {
                if self.sync.master_api.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::ValidationError(
                        "MASTER_API must be set on a client node".to_string(),
                    ));
                }
                if self.sync.timeout_seconds == 0 {
                    return Err(ConfigError::ValidationError(
                        "SYNC_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }
                if let Some(limit) = self.sync.max_stale_seconds {
                    if limit < self.sync.cache_ttl_seconds {
                        tracing::warn!(
                            max_stale = limit,
                            ttl = self.sync.cache_ttl_seconds,
                            "MAX_STALE_SECONDS is below the cache TTL; \
                             stale data will never be served"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
