use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::clients::Clients;
use crate::config::Config;
use crate::errors::HandlerError;
use crate::events::InvocationEvent;

pub mod clients;
pub mod config;
pub mod database;
pub mod errors;
pub mod events;
pub mod notification;
pub mod process;
pub mod secrets;

pub const SUCCESS_BODY: &str = "Lambda executed successfully";

pub fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .without_time()
        .with_target(false)
        .try_init()
        .ok();
}

/// What the function returns to the caller on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    pub fn success() -> Self {
        InvocationResult {
            status_code: 200,
            body: SUCCESS_BODY.to_string(),
        }
    }

    pub fn failure(error: &HandlerError) -> Self {
        InvocationResult {
            status_code: 500,
            body: error.to_string(),
        }
    }
}

// lambda handler
pub async fn handler(
    clients: &Clients,
    config: &Config,
    evt: LambdaEvent<InvocationEvent>,
) -> Result<InvocationResult, Error> {
    info!("Handling lambda invocation {}", evt.context.request_id);
    info!("Event received: {:?}", evt.payload);

    let result = match process::run(clients, config, &evt.payload).await {
        Ok(()) => InvocationResult::success(),
        Err(e) => {
            error!(kind = e.kind(), "invocation failed: {}", e);
            InvocationResult::failure(&e)
        }
    };

    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_serialisation() {
        assert_eq!(
            serde_json::to_value(InvocationResult::success()).unwrap(),
            json!({ "statusCode": 200, "body": "Lambda executed successfully" })
        );

        let failure = InvocationResult::failure(&HandlerError::missing(["SNS_TOPIC_ARN"]));
        assert_eq!(
            serde_json::to_value(failure).unwrap(),
            json!({ "statusCode": 500, "body": "Missing required configuration: SNS_TOPIC_ARN" })
        );
    }

    #[test]
    fn test_set_up_logging_twice() {
        set_up_logging();
        set_up_logging();
    }
}
