use std::env;
use thiserror::Error;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Which data-access backend the service talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Managed backend reached over its REST interface.
    Rest { url: String, service_key: String },
    /// Direct Postgres connection.
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub bind_address: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("DATA_BACKEND must be 'rest' or 'postgres', got '{0}'")]
    UnknownBackend(String),
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let backend = match get("DATA_BACKEND").as_deref().unwrap_or("rest") {
            "rest" => Backend::Rest {
                url: require("SUPABASE_URL")?,
                service_key: require("SUPABASE_SERVICE_ROLE_KEY")?,
            },
            "postgres" => Backend::Postgres {
                database_url: require("DATABASE_URL")?,
            },
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        Ok(Settings {
            backend,
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
        })
    }
}
