use thiserror::Error;

/// Failure of a single pipeline step. Every variant ends the invocation with a
/// 500 result whose body is the `Display` text below.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Missing required configuration: {}", names.join(", "))]
    MissingConfiguration { names: Vec<String> },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to fetch secret {secret_id}: {reason}")]
    SecretFetch { secret_id: String, reason: String },

    #[error("Failed to publish notification to {topic_arn}: {reason}")]
    Publish { topic_arn: String, reason: String },

    #[error("Failed to connect to database: {0}")]
    DatabaseConnect(String),

    #[error("Failed to query database: {0}")]
    DatabaseQuery(String),
}

impl HandlerError {
    pub fn missing<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HandlerError::MissingConfiguration {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Error kind name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::MissingConfiguration { .. } | HandlerError::InvalidConfiguration(_) => {
                "ConfigurationError"
            }
            HandlerError::SecretFetch { .. } => "SecretFetchError",
            HandlerError::Publish { .. } => "PublishError",
            HandlerError::DatabaseConnect(_) => "DatabaseConnectError",
            HandlerError::DatabaseQuery(_) => "DatabaseQueryError",
        }
    }
}

impl From<sqlx::Error> for HandlerError {
    fn from(error: sqlx::Error) -> Self {
        HandlerError::DatabaseQuery(error.to_string())
    }
}
