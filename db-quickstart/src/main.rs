//! Database Quickstart Lambda - Fetches database credentials from Secrets Manager
//! and runs a sample query.
//!
//! On each invocation this Lambda:
//! 1. Fetches the secret named by `database_secret_name` (cached across invocations)
//! 2. Parses it into database credentials
//! 3. Opens a connection and runs the sample query
//!
//! Never log or return credential values from here.

use std::sync::Arc;

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use shared::{Config, ConnectionBuilder, QuickstartHandler, SecretFetcher};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

async fn handler(state: Arc<QuickstartHandler>, event: LambdaEvent<Value>) -> Result<String, Error> {
    let (input, context) = event.into_parts();
    debug!(request_id = %context.request_id, input = %input, "Received invocation");

    Ok(state.handle().await.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env();
    info!(
        region = %config.region,
        secret_name = %config.database_secret_name,
        "Loaded configuration"
    );

    let fetcher = SecretFetcher::from_config(&config).await;
    let state = Arc::new(QuickstartHandler::new(config, fetcher, ConnectionBuilder::postgres()));
    let state_clone = state.clone();

    let result = run(service_fn(move |event| {
        let state = state_clone.clone();
        async move { handler(state, event).await }
    }))
    .await;

    state.close().await;
    result
}
