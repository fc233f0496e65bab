use factcheck_relay::{RelayConfig, UploadRelay};
use lambda_http::{run, service_fn, tracing, Error, Request};
mod http_handler;
use http_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // required to enable CloudWatch error logging by the runtime
    tracing::init_default_subscriber();

    let config = RelayConfig::from_env()?;
    tracing::info!(upstream = %config.upstream_url, "Starting fact-check upload relay");
    let relay = UploadRelay::new(config)?;

    // CORS headers and preflight handling come from the relay itself
    let relay = &relay;
    run(service_fn(move |event: Request| async move {
        function_handler(relay, event).await
    }))
    .await
}
