use aws_config::BehaviorVersion;
use lambda_data_collection::clients::Clients;
use lambda_data_collection::config::Config;
use lambda_data_collection::events::InvocationEvent;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_data_collection::set_up_logging();

    info!(
        "Initializing {} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load_from_env();
    info!("loaded configuration: {:?}", config);

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let clients = Clients::new(&aws_config, &config.region);

    run(service_fn(|request: LambdaEvent<InvocationEvent>| {
        lambda_data_collection::handler(&clients, &config, request)
    }))
    .await
}
