//! Database configuration.
//!
//! A configuration names the driver, carries that driver's options and
//! the connection string handed to the connection factory:
//!
//! ```json
//! {
//!     "connection_string": "host=localhost;database=metrics",
//!     "driver": { "name": "tdengine", "name_limit": 64 }
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlweave_core::{ConfigError, Error, Result};
use sqlweave_query::Driver;

/// Driver selection plus its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum DriverConfig {
    #[cfg(feature = "mysql")]
    Mysql(sqlweave_mysql::MysqlOptions),
    #[cfg(feature = "postgres")]
    Postgres(sqlweave_postgres::PostgresOptions),
    #[cfg(feature = "tdengine")]
    Tdengine(sqlweave_tdengine::TdengineOptions),
}

impl DriverConfig {
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "mysql")]
            DriverConfig::Mysql(_) => sqlweave_mysql::DRIVER_NAME,
            #[cfg(feature = "postgres")]
            DriverConfig::Postgres(_) => sqlweave_postgres::DRIVER_NAME,
            #[cfg(feature = "tdengine")]
            DriverConfig::Tdengine(_) => sqlweave_tdengine::DRIVER_NAME,
        }
    }

    /// Create the configured driver.
    pub fn into_driver(self) -> Arc<dyn Driver> {
        match self {
            #[cfg(feature = "mysql")]
            DriverConfig::Mysql(options) => Arc::new(sqlweave_mysql::MysqlDriver::new(options)),
            #[cfg(feature = "postgres")]
            DriverConfig::Postgres(options) => {
                Arc::new(sqlweave_postgres::PostgresDriver::new(options))
            }
            #[cfg(feature = "tdengine")]
            DriverConfig::Tdengine(options) => {
                Arc::new(sqlweave_tdengine::TdengineDriver::new(options))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub driver: DriverConfig,
}

impl DatabaseConfig {
    pub fn new(connection_string: impl Into<String>, driver: DriverConfig) -> Self {
        Self {
            connection_string: connection_string.into(),
            driver,
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid database configuration: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }
}
