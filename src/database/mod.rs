use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Map, Number, Value};
use tracing::{debug, info, warn};

use crate::config::DatabaseSettings;
use crate::errors::HandlerError;

pub mod mysql;

/// One record of the queried table, columns in select order.
pub type DatabaseRow = Map<String, Value>;

/// A decoded column value before it is turned into JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl From<ColumnValue> for Value {
    fn from(value: ColumnValue) -> Self {
        match value {
            ColumnValue::Null => Value::Null,
            ColumnValue::Bool(b) => Value::Bool(b),
            ColumnValue::Int(i) => Value::from(i),
            ColumnValue::UInt(u) => Value::from(u),
            ColumnValue::Float(f) => float(f),
            ColumnValue::Text(s) => Value::String(s),
            ColumnValue::Bytes(b) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            ColumnValue::Json(v) => v,
        }
    }
}

// JSON has no NaN or infinity
fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

pub fn row_from_columns<I>(columns: I) -> DatabaseRow
where
    I: IntoIterator<Item = (String, ColumnValue)>,
{
    columns
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect()
}

#[async_trait]
pub trait Database: Send + Sync {
    /// Opens a connection, giving up after `settings.connect_timeout`.
    async fn connect(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Box<dyn DatabaseConnection>, HandlerError>;
}

#[async_trait]
pub trait DatabaseConnection: Send {
    async fn query(&mut self, sql: &str) -> Result<Vec<DatabaseRow>, HandlerError>;

    /// Releases the connection. Failures are logged, not returned.
    async fn close(self: Box<Self>);
}

/// Runs the table query on a fresh connection. Once the connection is open it
/// is closed exactly once, whether the query succeeds, fails or times out.
pub async fn fetch_rows(
    database: &dyn Database,
    settings: &DatabaseSettings,
) -> Result<Vec<DatabaseRow>, HandlerError> {
    let sql = settings.select_all();

    let mut connection = database.connect(settings).await?;
    info!("connected to database {} on {}", settings.name, settings.host);

    let start = Instant::now();
    let outcome = tokio::time::timeout(settings.query_timeout, connection.query(&sql)).await;
    connection.close().await;
    debug!("database connection released");

    let rows = match outcome {
        Ok(result) => result?,
        Err(_) => {
            warn!("query exceeded {:?}", settings.query_timeout);
            return Err(HandlerError::DatabaseQuery(format!(
                "query did not finish within {}s",
                settings.query_timeout.as_secs_f64()
            )));
        }
    };

    info!(
        "fetched {} rows from {} in {:?}",
        rows.len(),
        settings.table,
        start.elapsed()
    );
    Ok(rows)
}
