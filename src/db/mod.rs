pub mod postgres;
pub mod rest;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Backend, Settings};

/// A record as it travels to and from the backend.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{0}")]
    Backend(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Equality filter `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter {
            column: column.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Left join of a lookup collection through a foreign key on the selected
/// collection. The joined columns come back nested under the lookup's name,
/// or as `null` when the foreign key is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub collection: String,
    pub foreign_key: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub collection: String,
    pub columns: Vec<String>,
    pub join: Option<Join>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Select {
    pub fn from(collection: &str) -> Self {
        Select {
            collection: collection.to_string(),
            columns: vec!["*".to_string()],
            join: None,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn join(mut self, collection: &str, foreign_key: &str, columns: &[&str]) -> Self {
        self.join = Some(Join {
            collection: collection.to_string(),
            foreign_key: foreign_key.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }
}

/// Generic create/read/update/delete access to named collections.
#[async_trait]
pub trait DataAccess: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError>;

    async fn insert(&self, collection: &str, record: Row) -> Result<(), DataError>;

    async fn update(&self, collection: &str, patch: Row, filter: &Filter) -> Result<(), DataError>;

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<(), DataError>;

    /// Releases backend resources once the server has stopped.
    async fn close(&self) {}
}

/// Builds the configured backend. Called once at startup; the result is
/// shared by every worker and closed after the server stops.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn DataAccess>, DataError> {
    match &settings.backend {
        Backend::Rest { url, service_key } => {
            log::info!("Using REST data backend at {}", url);
            Ok(Arc::new(rest::RestClient::new(url, service_key)?))
        }
        Backend::Postgres { database_url } => {
            log::info!("Using Postgres data backend");
            Ok(Arc::new(postgres::PgStore::connect(database_url).await?))
        }
    }
}

/// Serializes a typed record into the row shape sent to the backend.
pub fn to_row<T: serde::Serialize>(record: &T) -> Result<Row, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        _ => Err(serde::ser::Error::custom("record must serialize to an object")),
    }
}
