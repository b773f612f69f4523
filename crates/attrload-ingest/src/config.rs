//! Connector configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::coerce::{TemporalSettings, Zone};
use crate::error::ConfigError;
use crate::sink::{CreateTableOptions, InsertOptions};

// ============================================================================
// Defaults
// ============================================================================

/// Default number of records per batch write.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Prefix of every environment variable read by [`ConnectorConfig::from_env`].
pub const ENV_PREFIX: &str = "ATTRLOAD_";

/// Everything needed to set up a connector and run its cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub server_url: String,
    /// Collection for a newly created table
    pub collection_name: Option<String>,
    pub table_name: String,
    /// Schema text; only needed when the table does not exist yet
    pub schema: Option<String>,
    pub batch_size: usize,
    pub username: Option<String>,
    pub password: Option<String>,
    pub update_on_existing_pk: bool,
    pub replicate_table: bool,
    /// strftime or Java-style pattern for temporal columns
    pub date_format: Option<String>,
    /// IANA zone id or abbreviation; host zone when unset
    pub time_zone: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            collection_name: None,
            table_name: String::new(),
            schema: None,
            batch_size: DEFAULT_BATCH_SIZE,
            username: None,
            password: None,
            update_on_existing_pk: false,
            replicate_table: false,
            date_format: None,
            time_zone: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ConnectorConfig {
    pub fn new(server_url: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Load from `ATTRLOAD_*` environment variables (and `.env`), then validate
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable lookup; `lookup` receives full variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            server_url: var("SERVER_URL").unwrap_or_default(),
            collection_name: var("COLLECTION"),
            table_name: var("TABLE").unwrap_or_default(),
            schema: var("SCHEMA"),
            batch_size: parse_var("batch size", var("BATCH_SIZE"))?.unwrap_or(DEFAULT_BATCH_SIZE),
            username: var("USERNAME"),
            password: var("PASSWORD"),
            update_on_existing_pk: parse_var("update on existing pk", var("UPDATE_ON_EXISTING_PK"))?
                .unwrap_or(false),
            replicate_table: parse_var("replicate table", var("REPLICATE_TABLE"))?.unwrap_or(false),
            date_format: var("DATE_FORMAT"),
            time_zone: var("TIME_ZONE"),
            http_timeout_secs: parse_var("http timeout", var("HTTP_TIMEOUT_SECS"))?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Missing("server URL"));
        }

        if self.table_name.trim().is_empty() {
            return Err(ConfigError::Missing("table name"));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::PartialCredentials);
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "http timeout",
                message: "must be greater than 0".to_string(),
            });
        }

        self.zone()?;
        Ok(())
    }

    /// Time zone for temporal columns
    pub fn zone(&self) -> Result<Zone, ConfigError> {
        match self.time_zone.as_deref().map(str::trim).filter(|z| !z.is_empty()) {
            None => Ok(Zone::Local),
            Some(id) => Zone::parse(id).ok_or_else(|| ConfigError::InvalidTimeZone(id.to_string())),
        }
    }

    pub fn temporal_settings(&self) -> Result<TemporalSettings, ConfigError> {
        Ok(TemporalSettings::new(self.date_format.as_deref(), self.zone()?))
    }

    pub fn create_table_options(&self) -> CreateTableOptions {
        CreateTableOptions {
            collection_name: self.collection_name.clone().unwrap_or_default(),
            is_replicated: self.replicate_table,
        }
    }

    pub fn insert_options(&self) -> InsertOptions {
        InsertOptions {
            update_on_existing_pk: self.update_on_existing_pk,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Username and password, when both are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username.as_deref().zip(self.password.as_deref())
    }
}

fn parse_var<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                message: format!("'{}': {}", v, e),
            })
        })
        .transpose()
}
