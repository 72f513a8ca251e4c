//! Shared library for the database quickstart Lambda.
//!
//! This crate provides the configuration, secret fetching, credential parsing and
//! database connection pieces used by the Lambda binary.

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod invocation;
pub mod secrets;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use credentials::{parse_secret, try_parse_secret, CredentialsError, DatabaseCredentials};
pub use db::{ConnectionBuilder, ConnectionTarget, Connector, PgConnector, Session, SAMPLE_QUERY};
pub use error::{Error, Result};
pub use invocation::{QuickstartHandler, SUCCESS_MESSAGE};
pub use secrets::{CachedSecretSource, SecretError, SecretFetcher, SecretSource, SecretsManagerSource};
