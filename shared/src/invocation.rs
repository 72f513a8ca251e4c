//! Per-invocation flow: fetch secret, parse, connect, run the sample query.

use tracing::{info, warn};

use crate::credentials::try_parse_secret;
use crate::db::{ConnectionBuilder, SAMPLE_QUERY};
use crate::secrets::SecretFetcher;
use crate::{Config, Error, Result};

/// Returned to the invoker on every run, whatever happened internally.
pub const SUCCESS_MESSAGE: &str = "Lambda function to get a list of Databases completed successfully!";

/// State shared across invocations of one Lambda instance.
pub struct QuickstartHandler {
    config: Config,
    fetcher: SecretFetcher,
    builder: ConnectionBuilder,
}

impl QuickstartHandler {
    pub fn new(config: Config, fetcher: SecretFetcher, builder: ConnectionBuilder) -> Self {
        Self {
            config,
            fetcher,
            builder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one invocation, returning the number of rows read or the stage that failed.
    pub async fn invoke(&self) -> Result<u64> {
        let secret = self.fetcher.fetch(&self.config.database_secret_name).await?;

        let credentials = try_parse_secret(&secret).map_err(|e| {
            warn!(error = %e, "Could not parse database credentials from secret");
            Error::from(e)
        })?;

        let mut session = self.builder.build_connection(&credentials).await?;

        // The session is closed whether or not the query succeeds.
        let rows = session.run_query(SAMPLE_QUERY).await;
        if let Err(e) = session.close().await {
            warn!(kind = driver_error_kind(&e), "Failed to close database connection");
        }

        rows.map_err(|e| {
            let err = Error::Query(e);
            warn!(kind = err.kind(), "Sample query failed");
            err
        })
    }

    /// Run one invocation and report success to the invoker regardless of outcome.
    ///
    /// Failures only show up in the logs. Use [`QuickstartHandler::invoke`] to
    /// observe them.
    pub async fn handle(&self) -> &'static str {
        match self.invoke().await {
            Ok(rows) => info!(rows, "Sample query completed"),
            Err(e) => warn!(kind = e.kind(), "Invocation finished without running the sample query"),
        }
        SUCCESS_MESSAGE
    }

    /// Tear down the secret source.
    pub async fn close(&self) {
        self.fetcher.close().await;
    }
}

/// Category of a driver error, without its message.
fn driver_error_kind(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::Io(_) => "io",
        sqlx::Error::Tls(_) => "tls",
        sqlx::Error::Protocol(_) => "protocol",
        sqlx::Error::Database(_) => "database",
        _ => "other",
    }
}
