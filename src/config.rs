use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::errors::HandlerError;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_TABLE: &str = "data_collection";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Configuration read once at process start. Values that are only required
/// per invocation stay optional so a missing one is reported as a failed
/// invocation instead of a failed cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub secret_name: Option<String>,
    pub region: String,
    pub topic_arn: Option<String>,
    /// `None` when the database step is disabled.
    pub database: Option<DatabaseConfig>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub table: String,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    /// Settings present in the environment that did not parse; reported by
    /// `resolve`.
    pub invalid: Vec<String>,
}

/// Fully resolved connection parameters for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub table: String,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            secret_name: None,
            region: DEFAULT_REGION.to_string(),
            topic_arn: None,
            database: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: None,
            port: DEFAULT_DB_PORT,
            name: None,
            user: None,
            password: None,
            table: DEFAULT_DB_TABLE.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            invalid: Vec::new(),
        }
    }
}

// blank values count as unset
fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn flag(name: &str) -> bool {
    let value = env::var(name).unwrap_or_default();
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "" | "0" | "false" | "no" => false,
        _ => {
            warn!("{} has unrecognised value '{}', treating it as false", name, value);
            false
        }
    }
}

// falls back to the default and records the failure for `resolve`
fn parse_or<T>(name: &str, default: T, invalid: &mut Vec<String>) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match non_empty(name) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|e| {
            invalid.push(format!("{} '{}' - {}", name, raw, e));
            default
        }),
    }
}

impl Config {
    /// Never fails: anything wrong with the environment is reported by the
    /// invocation that needs it.
    pub fn load_from_env() -> Config {
        let database = if flag("ENABLE_DB_QUERY") {
            Some(DatabaseConfig::load_from_env())
        } else {
            None
        };

        Config {
            secret_name: non_empty("SECRET_NAME"),
            region: non_empty("CUSTOM_AWS_REGION").unwrap_or(DEFAULT_REGION.to_string()),
            topic_arn: non_empty("SNS_TOPIC_ARN"),
            database,
        }
    }

    pub fn secret_name(&self) -> Result<&str, HandlerError> {
        self.secret_name
            .as_deref()
            .ok_or_else(|| HandlerError::missing(["SECRET_NAME"]))
    }

    pub fn topic_arn(&self) -> Result<&str, HandlerError> {
        self.topic_arn
            .as_deref()
            .ok_or_else(|| HandlerError::missing(["SNS_TOPIC_ARN"]))
    }
}

impl DatabaseConfig {
    pub fn load_from_env() -> DatabaseConfig {
        let mut invalid = Vec::new();
        let port = parse_or("DB_PORT", DEFAULT_DB_PORT, &mut invalid);
        let connect_timeout =
            parse_or("DB_CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT_SECS, &mut invalid);
        let query_timeout = parse_or("DB_QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT_SECS, &mut invalid);

        DatabaseConfig {
            host: non_empty("DB_HOST"),
            port,
            name: non_empty("DB_NAME"),
            user: non_empty("DB_USER"),
            password: non_empty("DB_PASSWORD"),
            table: non_empty("DB_TABLE").unwrap_or(DEFAULT_DB_TABLE.to_string()),
            connect_timeout: Duration::from_secs(connect_timeout),
            query_timeout: Duration::from_secs(query_timeout),
            invalid,
        }
    }

    /// Resolves the connection parameters, reporting every missing one at once.
    pub fn resolve(&self) -> Result<DatabaseSettings, HandlerError> {
        let required = [
            ("DB_HOST", &self.host),
            ("DB_NAME", &self.name),
            ("DB_USER", &self.user),
            ("DB_PASSWORD", &self.password),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(HandlerError::missing(missing));
        }

        if !self.invalid.is_empty() {
            return Err(HandlerError::InvalidConfiguration(self.invalid.join(", ")));
        }

        if !is_valid_table_name(&self.table) {
            return Err(HandlerError::InvalidConfiguration(format!(
                "DB_TABLE '{}' is not a valid table name",
                self.table
            )));
        }

        Ok(DatabaseSettings {
            host: self.host.clone().unwrap_or_default(),
            port: self.port,
            name: self.name.clone().unwrap_or_default(),
            user: self.user.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            table: self.table.clone(),
            connect_timeout: self.connect_timeout,
            query_timeout: self.query_timeout,
        })
    }
}

/// Accepts `table` or `schema.table` made of ASCII alphanumerics, `_` and `$`.
fn is_valid_table_name(table: &str) -> bool {
    let parts: Vec<&str> = table.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

impl DatabaseSettings {
    /// The single statement the database step runs.
    pub fn select_all(&self) -> String {
        let quoted = self
            .table
            .split('.')
            .map(|part| format!("`{}`", part))
            .collect::<Vec<_>>()
            .join(".");
        format!("SELECT * FROM {}", quoted)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("invalid", &self.invalid)
            .finish()
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("table", &self.table)
            .finish()
    }
}
