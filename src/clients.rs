use std::sync::Arc;

use aws_config::{Region, SdkConfig};
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_sdk_sns::Client as SnsClient;

use crate::database::mysql::MySqlDatabase;
use crate::database::Database;
use crate::notification::{Notifier, SnsNotifier};
use crate::secrets::{SecretStore, SecretsManagerStore};

/// The external services the handler talks to. Built once per process and
/// shared by every invocation.
#[derive(Clone)]
pub struct Clients {
    pub secrets: Arc<dyn SecretStore>,
    pub notifier: Arc<dyn Notifier>,
    pub database: Arc<dyn Database>,
}

impl Clients {
    /// Secrets Manager is pinned to `secrets_region`; SNS follows the
    /// environment's region.
    pub fn new(sdk_config: &SdkConfig, secrets_region: &str) -> Self {
        let secrets_config = aws_sdk_secretsmanager::config::Builder::from(sdk_config)
            .region(Region::new(secrets_region.to_string()))
            .build();

        Clients {
            secrets: Arc::new(SecretsManagerStore::new(SecretsManagerClient::from_conf(
                secrets_config,
            ))),
            notifier: Arc::new(SnsNotifier::new(SnsClient::new(sdk_config))),
            database: Arc::new(MySqlDatabase),
        }
    }
}
