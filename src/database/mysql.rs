use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row, TypeInfo};
use tracing::{debug, warn};

use super::{row_from_columns, ColumnValue, Database, DatabaseConnection, DatabaseRow};
use crate::config::DatabaseSettings;
use crate::errors::HandlerError;

/// MySQL driver. Holds no state; every invocation opens its own connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDatabase;

#[async_trait]
impl Database for MySqlDatabase {
    async fn connect(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Box<dyn DatabaseConnection>, HandlerError> {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.name);

        debug!("connecting to {:?}", settings);
        let connection =
            tokio::time::timeout(settings.connect_timeout, MySqlConnection::connect_with(&options))
                .await
                .map_err(|_| {
                    HandlerError::DatabaseConnect(format!(
                        "no connection to {}:{} within {}s",
                        settings.host,
                        settings.port,
                        settings.connect_timeout.as_secs_f64()
                    ))
                })?
                .map_err(|e| HandlerError::DatabaseConnect(e.to_string()))?;

        Ok(Box::new(MySqlSession { connection }))
    }
}

struct MySqlSession {
    connection: MySqlConnection,
}

#[async_trait]
impl DatabaseConnection for MySqlSession {
    async fn query(&mut self, sql: &str) -> Result<Vec<DatabaseRow>, HandlerError> {
        debug!("executing {}", sql);
        // a bare &str has no arguments, so it runs over the text protocol and
        // every value arrives in MySQL's own text form
        let rows = (&mut self.connection).fetch_all(sql).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.connection.close().await {
            warn!("failed to close database connection cleanly - {}", e);
        }
    }
}

fn decode_row(row: &MySqlRow) -> Result<DatabaseRow, HandlerError> {
    let columns = row
        .columns()
        .iter()
        .map(|column| {
            let raw = row.try_get_unchecked::<Option<Vec<u8>>, _>(column.ordinal())?;
            let value = match raw {
                None => ColumnValue::Null,
                Some(bytes) => parse_column(column.type_info().name(), &bytes),
            };
            Ok((column.name().to_string(), value))
        })
        .collect::<Result<Vec<_>, HandlerError>>()?;
    Ok(row_from_columns(columns))
}

/// Converts one non-NULL text-protocol value. Never fails: anything that
/// does not parse as its declared type is kept as text, or as bytes when it
/// is not UTF-8.
pub fn parse_column(type_name: &str, raw: &[u8]) -> ColumnValue {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(_) => return ColumnValue::Bytes(raw.to_vec()),
    };

    match type_name {
        "BOOLEAN" => match text.parse::<i64>() {
            Ok(n) => ColumnValue::Bool(n != 0),
            Err(_) => as_text(text),
        },
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            text.parse().map(ColumnValue::Int).unwrap_or_else(|_| as_text(text))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => {
            text.parse().map(ColumnValue::UInt).unwrap_or_else(|_| as_text(text))
        }
        "FLOAT" | "DOUBLE" | "DECIMAL" => text
            .parse()
            .map(ColumnValue::Float)
            .unwrap_or_else(|_| as_text(text)),
        "DATETIME" | "TIMESTAMP" => {
            match NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
                Ok(dt) => ColumnValue::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
                // zero dates and other values chrono cannot hold
                Err(_) => as_text(text),
            }
        }
        "JSON" => serde_json::from_str(text)
            .map(ColumnValue::Json)
            .unwrap_or_else(|_| as_text(text)),
        "BIT" => bit_value(raw),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
            ColumnValue::Bytes(raw.to_vec())
        }
        // DATE, TIME, ENUM, SET, character types and anything newer
        _ => as_text(text),
    }
}

fn as_text(text: &str) -> ColumnValue {
    ColumnValue::Text(text.to_string())
}

// BIT(n) is sent big-endian, at most 8 bytes
fn bit_value(raw: &[u8]) -> ColumnValue {
    if raw.len() > 8 {
        return ColumnValue::Bytes(raw.to_vec());
    }
    ColumnValue::UInt(raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}
