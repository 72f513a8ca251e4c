//! In-memory fakes for the secret store and the database.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing_subscriber::fmt::MakeWriter;

use crate::db::{ConnectionTarget, Connector, Session};
use crate::secrets::{SecretError, SecretSource};
use crate::DatabaseCredentials;

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct Flag(Arc<AtomicBool>);

impl Flag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

enum Response {
    Payload(String),
    Fail(fn(&str) -> SecretError),
}

pub struct FakeSecretSource {
    response: Response,
    calls: Counter,
    closed: Flag,
}

impl FakeSecretSource {
    pub fn payload(payload: &str) -> Self {
        Self::with(Response::Payload(payload.to_string()))
    }

    pub fn failing(error: fn(&str) -> SecretError) -> Self {
        Self::with(Response::Fail(error))
    }

    fn with(response: Response) -> Self {
        Self {
            response,
            calls: Counter::default(),
            closed: Flag::default(),
        }
    }

    pub fn calls(&self) -> Counter {
        self.calls.clone()
    }

    pub fn closed(&self) -> Flag {
        self.closed.clone()
    }
}

#[async_trait]
impl SecretSource for FakeSecretSource {
    async fn get(&self, secret_name: &str) -> Result<String, SecretError> {
        self.calls.bump();
        match &self.response {
            Response::Payload(payload) => Ok(payload.clone()),
            Response::Fail(error) => Err(error(secret_name)),
        }
    }

    async fn close(&self) {
        self.closed.set();
    }
}

pub struct FakeConnector {
    reachable: bool,
    rows: u64,
    query_fails: bool,
    calls: Counter,
    closed_sessions: Counter,
}

impl FakeConnector {
    /// Accepts every connection; queries return `rows`.
    pub fn reachable(rows: u64) -> Self {
        Self {
            reachable: true,
            rows,
            query_fails: false,
            calls: Counter::default(),
            closed_sessions: Counter::default(),
        }
    }

    /// Accepts connections, but every query fails.
    pub fn failing_queries() -> Self {
        Self {
            query_fails: true,
            ..Self::reachable(0)
        }
    }

    /// Refuses every connection.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::reachable(0)
        }
    }

    pub fn calls(&self) -> Counter {
        self.calls.clone()
    }

    pub fn closed_sessions(&self) -> Counter {
        self.closed_sessions.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _target: &ConnectionTarget,
        _credentials: &DatabaseCredentials,
    ) -> Result<Box<dyn Session>, sqlx::Error> {
        self.calls.bump();
        if !self.reachable {
            return Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(Box::new(FakeSession {
            rows: self.rows,
            query_fails: self.query_fails,
            closed: self.closed_sessions.clone(),
        }))
    }
}

struct FakeSession {
    rows: u64,
    query_fails: bool,
    closed: Counter,
}

#[async_trait]
impl Session for FakeSession {
    async fn run_query(&mut self, _query: &str) -> Result<u64, sqlx::Error> {
        if self.query_fails {
            return Err(sqlx::Error::Protocol("relation \"table_name\" does not exist".into()));
        }
        Ok(self.rows)
    }

    async fn close(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.closed.bump();
        Ok(())
    }
}

/// Captures formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
