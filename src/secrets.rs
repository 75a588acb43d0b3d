use std::fmt;

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_smithy_types::error::display::DisplayErrorContext;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::HandlerError;

/// Credential fields of one secret. Fetched on every invocation and dropped
/// with it.
#[derive(Clone, PartialEq)]
pub struct SecretBundle(Map<String, Value>);

impl SecretBundle {
    /// Parses a `SecretString` payload, which must be a JSON object.
    pub fn parse(secret_id: &str, payload: &str) -> Result<Self, HandlerError> {
        let fail = |reason: String| HandlerError::SecretFetch {
            secret_id: secret_id.to_string(),
            reason,
        };
        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(map)) => Ok(SecretBundle(map)),
            Ok(_) => Err(fail("secret payload is not a JSON object".to_string())),
            Err(e) => Err(fail(format!("secret payload is not valid JSON - {}", e))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// values never reach the logs
impl fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBundle")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, secret_id: &str) -> Result<SecretBundle, HandlerError>;
}

/// Secrets Manager backed store. The region is fixed when the client is built.
#[derive(Clone)]
pub struct SecretsManagerStore {
    client: SecretsManagerClient,
}

impl SecretsManagerStore {
    pub fn new(client: SecretsManagerClient) -> Self {
        SecretsManagerStore { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret(&self, secret_id: &str) -> Result<SecretBundle, HandlerError> {
        debug!("fetching secret {}", secret_id);
        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|error| HandlerError::SecretFetch {
                secret_id: secret_id.to_string(),
                reason: format!(
                    "failed to access AWS Secrets Manager, make sure the function can read this secret - {}",
                    DisplayErrorContext(&error)
                ),
            })?;

        let payload = response
            .secret_string()
            .ok_or_else(|| HandlerError::SecretFetch {
                secret_id: secret_id.to_string(),
                reason: "secret has no SecretString value".to_string(),
            })?;

        SecretBundle::parse(secret_id, payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use aws_sdk_secretsmanager::config::{Credentials, Region};
    use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_runtime_api::http::{Request, Response, StatusCode};
    use aws_smithy_types::body::SdkBody;

    // mock_client returns a Secrets Manager client that answers every call with the given response
    fn mock_client(status: u16, body: &str) -> SecretsManagerClient {
        let mut response = Response::new(
            StatusCode::try_from(status).unwrap(),
            SdkBody::from(body.to_string()),
        );
        response
            .headers_mut()
            .insert("content-type", "application/x-amz-json-1.1");

        let replay_event = ReplayEvent::new(Request::new(SdkBody::from("")), response);

        let conf = aws_sdk_secretsmanager::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .credentials_provider(Credentials::new(
                "SOMETESTKEYID",
                "somesecretkey",
                Some("somesessiontoken".to_string()),
                None,
                "",
            ))
            .region(Region::new("us-east-1"))
            .retry_config(aws_sdk_secretsmanager::config::retry::RetryConfig::disabled())
            .http_client(StaticReplayClient::new(vec![replay_event]))
            .build();

        SecretsManagerClient::from_conf(conf)
    }

    #[test]
    fn test_parse_bundle() {
        let bundle = SecretBundle::parse(
            "prod/db",
            r#"{"host":"db.internal","username":"reader","password":"hunter2","port":3306}"#,
        )
        .unwrap();
        assert_eq!(bundle.len(), 4);
        assert_eq!(bundle.get("host"), Some("db.internal"));
        assert_eq!(bundle.get("port"), None);

        let debug = format!("{:?}", bundle);
        assert!(debug.contains("password"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        for payload in ["not json", "[1,2]", "\"text\""] {
            let err = SecretBundle::parse("prod/db", payload).unwrap_err();
            assert_eq!(err.kind(), "SecretFetchError", "payload: {}", payload);
        }
    }

    #[tokio::test]
    async fn test_get_secret() {
        let client = mock_client(
            200,
            r#"{
                "ARN": "arn:aws:secretsmanager:us-east-1:123456789012:secret:prod/db-AbCdEf",
                "Name": "prod/db",
                "SecretString": "{\"host\":\"db.internal\",\"database\":\"metrics\"}",
                "VersionId": "EXAMPLE1-90ab-cdef-fedc-ba987SECRET1"
            }"#,
        );
        let store = SecretsManagerStore::new(client);
        let bundle = store.get_secret("prod/db").await.unwrap();
        assert_eq!(bundle.get("database"), Some("metrics"));
    }

    #[tokio::test]
    async fn test_get_secret_without_string() {
        let client = mock_client(
            200,
            r#"{"ARN": "arn:aws:secretsmanager:us-east-1:123456789012:secret:bin", "Name": "bin"}"#,
        );
        let err = SecretsManagerStore::new(client)
            .get_secret("bin")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SecretString"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_get_secret_not_found() {
        let client = mock_client(
            400,
            r#"{"__type": "ResourceNotFoundException", "message": "Secrets Manager can't find the specified secret."}"#,
        );
        let err = SecretsManagerStore::new(client)
            .get_secret("missing")
            .await
            .unwrap_err();
        match err {
            HandlerError::SecretFetch { secret_id, .. } => assert_eq!(secret_id, "missing"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
