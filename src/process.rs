use tracing::{debug, info};

use crate::clients::Clients;
use crate::config::Config;
use crate::database;
use crate::errors::HandlerError;
use crate::events::InvocationEvent;
use crate::notification::NotificationMessage;

/// Runs every step for one event, stopping at the first failure.
pub async fn run(
    clients: &Clients,
    config: &Config,
    event: &InvocationEvent,
) -> Result<(), HandlerError> {
    let secret_name = config.secret_name()?;
    let bundle = clients.secrets.get_secret(secret_name).await?;
    info!("fetched secret {} ({} fields)", secret_name, bundle.len());
    debug!("secret bundle: {:?}", bundle);

    let fields = event.fields();
    let message = NotificationMessage::compose(&fields);
    debug!("composed notification: {}", message.text);

    let topic_arn = config.topic_arn()?;
    let message_id = clients.notifier.publish(topic_arn, &message).await?;
    info!("published notification {} to {}", message_id, topic_arn);

    if let Some(db_config) = &config.database {
        let settings = db_config.resolve()?;
        let rows = database::fetch_rows(clients.database.as_ref(), &settings).await?;
        for row in &rows {
            info!("row: {}", serde_json::Value::Object(row.clone()));
        }
    }

    Ok(())
}
