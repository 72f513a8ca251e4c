//! Database credentials parsed from a secret payload.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Errors raised while parsing a secret payload.
///
/// None of the variants carry payload text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("secret payload is empty")]
    EmptyPayload,
    #[error("secret payload is not valid JSON (line {line}, column {column})")]
    Malformed { line: usize, column: usize },
    #[error("secret payload is not a JSON object")]
    NotAnObject,
    #[error("secret payload has no `{0}` field")]
    MissingField(&'static str),
    #[error("secret payload field `{0}` is not a scalar value")]
    InvalidField(&'static str),
}

/// Database credentials from Secrets Manager.
///
/// `Debug` reports which fields are set, never their values.
pub struct DatabaseCredentials {
    username: String,
    password: SecretString,
    host: String,
    port: String,
    dbname: String,
}

impl DatabaseCredentials {
    pub const FIELDS: [&'static str; 5] = ["username", "password", "host", "port", "dbname"];

    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            host: host.into(),
            port: port.into(),
            dbname: dbname.into(),
        }
    }

    /// Credentials with every field unset.
    pub fn empty() -> Self {
        Self::new("", "", "", "", "")
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    fn field_values(&self) -> [(&'static str, &str); 5] {
        [
            ("username", self.username.as_str()),
            ("password", self.password.expose_secret()),
            ("host", self.host.as_str()),
            ("port", self.port.as_str()),
            ("dbname", self.dbname.as_str()),
        ]
    }

    /// Names of the fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.field_values()
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// True when all five fields are non-empty.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DatabaseCredentials");
        for (name, value) in self.field_values() {
            s.field(name, &if value.is_empty() { "<unset>" } else { "<set>" });
        }
        s.finish()
    }
}

/// Parse a secret payload into database credentials.
///
/// Scalar values are accepted for every field and read as strings, so a
/// numeric `port` is valid. Unknown keys are ignored.
pub fn try_parse_secret(raw: &str) -> Result<DatabaseCredentials, CredentialsError> {
    if raw.trim().is_empty() {
        return Err(CredentialsError::EmptyPayload);
    }

    let value: Value = serde_json::from_str(raw).map_err(|e| CredentialsError::Malformed {
        line: e.line(),
        column: e.column(),
    })?;
    let object = value.as_object().ok_or(CredentialsError::NotAnObject)?;

    Ok(DatabaseCredentials::new(
        field(object, "username")?,
        field(object, "password")?,
        field(object, "host")?,
        field(object, "port")?,
        field(object, "dbname")?,
    ))
}

/// Parse a secret payload, falling back to empty credentials on any error.
///
/// The failure is logged; the payload never is.
pub fn parse_secret(raw: &str) -> DatabaseCredentials {
    match try_parse_secret(raw) {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!(error = %e, "Could not parse database credentials from secret");
            DatabaseCredentials::empty()
        }
    }
}

fn field(object: &Map<String, Value>, name: &'static str) -> Result<String, CredentialsError> {
    match object.get(name) {
        None | Some(Value::Null) => Err(CredentialsError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(CredentialsError::InvalidField(name)),
    }
}
