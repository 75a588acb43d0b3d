use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use aws_smithy_types::error::display::DisplayErrorContext;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::HandlerError;
use crate::events::{display_value, EventFields};

// SNS rejects longer email subjects
const MAX_SUBJECT_CHARS: usize = 100;

/// The same event information in the two shapes subscribers consume:
/// plain text for email and a JSON document for everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub subject: String,
    pub text: String,
    pub structured: Value,
}

impl NotificationMessage {
    pub fn compose(fields: &EventFields) -> Self {
        let source = display_value(&fields.source);
        let detail_type = display_value(&fields.detail_type);
        let message = display_value(&fields.message);

        let text = format!(
            "A new event was received from {source} with detail type {detail_type}.\n\n\
             Details: {message}"
        );

        let structured = json!({
            "source": fields.source,
            "detail-type": fields.detail_type,
            "message": fields.message,
        });

        NotificationMessage {
            subject: subject_line(&detail_type),
            text,
            structured,
        }
    }

    /// The per-protocol envelope sent with `MessageStructure=json`. Every value
    /// has to be a string, so the structured form is embedded as JSON text.
    pub fn envelope(&self) -> Value {
        json!({
            "default": self.structured.to_string(),
            "email": self.text,
        })
    }
}

fn subject_line(detail_type: &str) -> String {
    format!("Event notification: {}", detail_type)
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_SUBJECT_CHARS)
        .collect()
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publishes the message and returns the service's message id.
    async fn publish(
        &self,
        topic_arn: &str,
        message: &NotificationMessage,
    ) -> Result<String, HandlerError>;
}

#[derive(Clone)]
pub struct SnsNotifier {
    client: SnsClient,
}

impl SnsNotifier {
    pub fn new(client: SnsClient) -> Self {
        SnsNotifier { client }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &NotificationMessage,
    ) -> Result<String, HandlerError> {
        debug!("publishing to {}: {:?}", topic_arn, message);
        let response = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .subject(&message.subject)
            .message(message.envelope().to_string())
            .message_structure("json")
            .send()
            .await
            .map_err(|error| HandlerError::Publish {
                topic_arn: topic_arn.to_string(),
                reason: DisplayErrorContext(&error).to_string(),
            })?;

        Ok(response.message_id().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::events::InvocationEvent;
    use aws_sdk_sns::config::{Credentials, Region};
    use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_runtime_api::http::{Request, Response, StatusCode};
    use aws_smithy_types::body::SdkBody;

    fn mock_client(status: u16, body: &str) -> (SnsClient, StaticReplayClient) {
        let mut response = Response::new(
            StatusCode::try_from(status).unwrap(),
            SdkBody::from(body.to_string()),
        );
        response.headers_mut().insert("content-type", "text/xml");

        let http_client =
            StaticReplayClient::new(vec![ReplayEvent::new(Request::new(SdkBody::from("")), response)]);

        let conf = aws_sdk_sns::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .credentials_provider(Credentials::new(
                "SOMETESTKEYID",
                "somesecretkey",
                Some("somesessiontoken".to_string()),
                None,
                "",
            ))
            .region(Region::new("eu-central-1"))
            .retry_config(aws_sdk_sns::config::retry::RetryConfig::disabled())
            .http_client(http_client.clone())
            .build();

        (SnsClient::from_conf(conf), http_client)
    }

    fn alert() -> NotificationMessage {
        let evt = InvocationEvent::from(json!({
            "source": "svc-a",
            "detail-type": "alert",
            "detail": { "message": "disk full" }
        }));
        NotificationMessage::compose(&evt.fields())
    }

    #[test]
    fn test_compose_contains_event_fields() {
        let message = alert();
        assert!(message.text.contains("svc-a"));
        assert!(message.text.contains("alert"));
        assert!(message.text.contains("disk full"));
        assert_eq!(message.subject, "Event notification: alert");
        assert_eq!(
            message.structured,
            json!({ "source": "svc-a", "detail-type": "alert", "message": "disk full" })
        );
    }

    #[test]
    fn test_envelope_values_are_strings() {
        let envelope = alert().envelope();
        let default = envelope["default"].as_str().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(default).unwrap(),
            alert().structured
        );
        assert_eq!(envelope["email"].as_str().unwrap(), alert().text);
    }

    #[test]
    fn test_subject_is_sanitised() {
        let subject = subject_line(&format!("line\nbreak{}", "x".repeat(200)));
        assert_eq!(subject.chars().count(), MAX_SUBJECT_CHARS);
        assert!(subject.starts_with("Event notification: line break"));
    }

    #[tokio::test]
    async fn test_publish() {
        let (client, http_client) = mock_client(
            200,
            r#"<PublishResponse xmlns="http://sns.amazonaws.com/doc/2010-03-31/">
                <PublishResult>
                    <MessageId>567910cd-659e-55d4-8ccb-5aaf14679dc0</MessageId>
                </PublishResult>
                <ResponseMetadata>
                    <RequestId>d74b8436-ae13-5ab4-a9ff-ce54dfea72a0</RequestId>
                </ResponseMetadata>
            </PublishResponse>"#,
        );

        let message_id = SnsNotifier::new(client)
            .publish("arn:aws:sns:eu-central-1:123456789012:alerts", &alert())
            .await
            .unwrap();
        assert_eq!(message_id, "567910cd-659e-55d4-8ccb-5aaf14679dc0");

        let requests = http_client.actual_requests().collect::<Vec<_>>();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(requests[0].body().bytes().unwrap()).to_string();
        assert!(body.contains("MessageStructure=json"), "got: {}", body);
    }

    #[tokio::test]
    async fn test_publish_failure() {
        let (client, _) = mock_client(
            404,
            r#"<ErrorResponse xmlns="http://sns.amazonaws.com/doc/2010-03-31/">
                <Error>
                    <Type>Sender</Type>
                    <Code>NotFound</Code>
                    <Message>Topic does not exist</Message>
                </Error>
                <RequestId>a8dec8b3-33a4-11df-8963-01868b7c937a</RequestId>
            </ErrorResponse>"#,
        );

        let err = SnsNotifier::new(client)
            .publish("arn:aws:sns:eu-central-1:123456789012:missing", &alert())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "PublishError");
        assert!(err.to_string().contains("missing"));
    }
}
