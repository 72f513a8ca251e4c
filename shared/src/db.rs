//! Database connection management.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, info, warn};

use crate::{DatabaseCredentials, Error, Result};

/// Fixed, parameterless query run on every invocation.
pub const SAMPLE_QUERY: &str = "select * from table_name";

/// Where to connect, without any credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub dbname: String,
}

impl ConnectionTarget {
    pub fn from_credentials(credentials: &DatabaseCredentials) -> Result<Self> {
        let port = credentials
            .port()
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPort)?;

        Ok(Self {
            host: credentials.host().to_string(),
            port,
            dbname: credentials.dbname().to_string(),
        })
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postgres://{}:{}/{}", self.host, self.port, self.dbname)
    }
}

/// An open database connection.
#[async_trait]
pub trait Session: Send {
    /// Run `query` and walk every returned row, returning how many there were.
    async fn run_query(&mut self, query: &str) -> std::result::Result<u64, sqlx::Error>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> std::result::Result<(), sqlx::Error>;
}

/// Opens sessions against a database.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        target: &ConnectionTarget,
        credentials: &DatabaseCredentials,
    ) -> std::result::Result<Box<dyn Session>, sqlx::Error>;
}

/// Single, unpooled Postgres connection.
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn connect(
        &self,
        target: &ConnectionTarget,
        credentials: &DatabaseCredentials,
    ) -> std::result::Result<Box<dyn Session>, sqlx::Error> {
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.dbname)
            .username(credentials.username())
            .password(credentials.password().expose_secret());

        let connection = PgConnection::connect_with(&options).await?;
        Ok(Box::new(PgSession { connection }))
    }
}

pub struct PgSession {
    connection: PgConnection,
}

#[async_trait]
impl Session for PgSession {
    async fn run_query(&mut self, query: &str) -> std::result::Result<u64, sqlx::Error> {
        walk_rows(sqlx::query(query).fetch(&mut self.connection)).await
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), sqlx::Error> {
        self.connection.close().await
    }
}

/// Pull rows off `rows` one at a time, returning how many were read.
async fn walk_rows<S, R>(mut rows: S) -> std::result::Result<u64, sqlx::Error>
where
    S: Stream<Item = std::result::Result<R, sqlx::Error>> + Unpin,
{
    let mut seen = 0u64;
    while let Some(_row) = rows.try_next().await? {
        // Business logic on each row goes here.
        seen += 1;
    }
    Ok(seen)
}

/// Turns credentials into a live session.
#[derive(Clone)]
pub struct ConnectionBuilder {
    connector: Arc<dyn Connector>,
}

impl ConnectionBuilder {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    pub fn postgres() -> Self {
        Self::new(Arc::new(PgConnector))
    }

    /// Open a session, skipping the network call when credentials are incomplete.
    pub async fn build_connection(&self, credentials: &DatabaseCredentials) -> Result<Box<dyn Session>> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            warn!(missing = ?missing, "Database credentials incomplete, skipping connection");
            return Err(Error::IncompleteCredentials(missing));
        }

        let target = ConnectionTarget::from_credentials(credentials).map_err(|e| {
            warn!(kind = e.kind(), "Database port is not numeric, skipping connection");
            e
        })?;

        debug!(port = target.port, "Opening database connection");
        match self.connector.connect(&target, credentials).await {
            Ok(session) => {
                info!("Created database connection");
                Ok(session)
            }
            Err(e) => {
                let err = Error::Connect(e);
                warn!(kind = err.kind(), "Could not get a connection to database");
                Err(err)
            }
        }
    }

    /// Open a session, turning any failure into `None`.
    pub async fn connect_or_none(&self, credentials: &DatabaseCredentials) -> Option<Box<dyn Session>> {
        self.build_connection(credentials).await.ok()
    }
}
