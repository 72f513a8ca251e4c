//! Error types for the database quickstart Lambda.

use thiserror::Error;

use crate::credentials::CredentialsError;
use crate::secrets::SecretError;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a single invocation.
///
/// Every variant maps to one stage of the invocation, so callers can tell
/// which stage stopped the run.
#[derive(Error, Debug)]
pub enum Error {
    /// Secret could not be fetched from the secret store
    #[error("Secret fetch failed: {0}")]
    Secret(#[from] SecretError),

    /// Secret payload could not be parsed into credentials
    #[error("Credential parse failed: {0}")]
    Credentials(#[from] CredentialsError),

    /// One or more credential fields are empty
    #[error("Incomplete credentials, missing: {}", .0.join(", "))]
    IncompleteCredentials(Vec<&'static str>),

    /// Port field is not a valid TCP port
    #[error("Database port is not a valid port number")]
    InvalidPort,

    /// Connection to the database failed
    #[error("Database connection failed")]
    Connect(#[source] sqlx::Error),

    /// Sample query failed
    #[error("Database query failed")]
    Query(#[source] sqlx::Error),
}

impl Error {
    /// Short, stable tag for logging.
    ///
    /// Driver messages can echo the username back, so logs carry this tag
    /// instead of the error's source chain.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Secret(e) => e.kind(),
            Error::Credentials(_) => "credential_parse",
            Error::IncompleteCredentials(_) => "incomplete_credentials",
            Error::InvalidPort => "invalid_port",
            Error::Connect(_) => "connect",
            Error::Query(_) => "query",
        }
    }
}
