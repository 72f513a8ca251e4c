//! AWS Secrets Manager integration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::operation::get_secret_value::{GetSecretValueError, GetSecretValueOutput};
use aws_sdk_secretsmanager::Client as SecretsClient;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Config;

/// Failures from the secret store.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("no secret found with name {0}")]
    NotFound(String),
    #[error("secret could not be decrypted with its KMS key")]
    DecryptionFailure,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid request for the current state of the secret: {0}")]
    InvalidRequest(String),
    #[error("secrets manager internal error: {0}")]
    InternalService(String),
    #[error("secrets manager call failed: {0}")]
    Service(String),
    #[error("secret has neither a string nor a binary value")]
    Empty,
    #[error("binary secret is not valid UTF-8")]
    InvalidEncoding,
}

impl SecretError {
    pub fn kind(&self) -> &'static str {
        match self {
            SecretError::NotFound(_) => "secret_not_found",
            SecretError::DecryptionFailure => "secret_decryption_failure",
            SecretError::InvalidParameter(_) => "secret_invalid_parameter",
            SecretError::InvalidRequest(_) => "secret_invalid_request",
            SecretError::InternalService(_) => "secret_internal_service",
            SecretError::Service(_) => "secret_service",
            SecretError::Empty => "secret_empty",
            SecretError::InvalidEncoding => "secret_invalid_encoding",
        }
    }

    fn from_get_secret_value(secret_name: &str, err: GetSecretValueError, detail: String) -> Self {
        match err {
            GetSecretValueError::ResourceNotFoundException(_) => {
                SecretError::NotFound(secret_name.to_string())
            }
            GetSecretValueError::DecryptionFailure(_) => SecretError::DecryptionFailure,
            GetSecretValueError::InvalidParameterException(e) => {
                SecretError::InvalidParameter(e.message().unwrap_or_default().to_string())
            }
            GetSecretValueError::InvalidRequestException(e) => {
                SecretError::InvalidRequest(e.message().unwrap_or_default().to_string())
            }
            GetSecretValueError::InternalServiceError(e) => {
                SecretError::InternalService(e.message().unwrap_or_default().to_string())
            }
            _ => SecretError::Service(detail),
        }
    }
}

/// A store that serves secret payloads by name.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the raw payload of a secret.
    async fn get(&self, secret_name: &str) -> Result<String, SecretError>;

    /// Release any resources held by the source.
    async fn close(&self) {}
}

/// Secrets Manager backed source.
pub struct SecretsManagerSource {
    client: SecretsClient,
}

impl SecretsManagerSource {
    pub fn new(client: SecretsClient) -> Self {
        Self { client }
    }

    /// Build a client for `region`, or from the default region chain when empty.
    pub async fn for_region(region: &str) -> Self {
        let loader = aws_config::defaults(BehaviorVersion::latest());
        let loader = if region.is_empty() {
            loader
        } else {
            loader.region(Region::new(region.to_string()))
        };
        Self::new(SecretsClient::new(&loader.load().await))
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    async fn get(&self, secret_name: &str) -> Result<String, SecretError> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_name)
            .send()
            .await
            .map_err(|e| {
                let detail = DisplayErrorContext(&e).to_string();
                SecretError::from_get_secret_value(secret_name, e.into_service_error(), detail)
            })?;

        payload_from(&response)
    }
}

/// Extract the payload from a `GetSecretValue` response.
fn payload_from(output: &GetSecretValueOutput) -> Result<String, SecretError> {
    // Depending on how the secret was stored, only one of these is populated.
    if let Some(secret) = output.secret_string() {
        return Ok(secret.to_string());
    }
    let binary = output.secret_binary().ok_or(SecretError::Empty)?;
    String::from_utf8(binary.as_ref().to_vec()).map_err(|_| SecretError::InvalidEncoding)
}

struct CachedSecret {
    value: String,
    fetched_at: Instant,
}

/// Keeps recently fetched secrets resident for `ttl`.
///
/// Safe to share across concurrent invocations. Failures are not cached.
pub struct CachedSecretSource<S> {
    inner: S,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedSecret>>,
}

impl<S: SecretSource> CachedSecretSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop a single cached secret, e.g. after a credential rotation.
    pub async fn invalidate(&self, secret_name: &str) {
        self.entries.write().await.remove(secret_name);
    }
}

#[async_trait]
impl<S: SecretSource> SecretSource for CachedSecretSource<S> {
    async fn get(&self, secret_name: &str) -> Result<String, SecretError> {
        // Check cache first
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(secret_name) {
                if entry.fetched_at.elapsed() < self.ttl {
                    debug!(secret_name, "Secret served from cache");
                    return Ok(entry.value.clone());
                }
            }
        }

        let value = self.inner.get(secret_name).await?;

        self.entries.write().await.insert(
            secret_name.to_string(),
            CachedSecret {
                value: value.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(value)
    }

    async fn close(&self) {
        self.entries.write().await.clear();
        self.inner.close().await;
    }
}

/// Fetches secret payloads through a [`SecretSource`].
#[derive(Clone)]
pub struct SecretFetcher {
    source: Arc<dyn SecretSource>,
}

impl SecretFetcher {
    pub fn new(source: Arc<dyn SecretSource>) -> Self {
        Self { source }
    }

    /// Secrets Manager source for the configured region, cached when a TTL is set.
    pub async fn from_config(config: &Config) -> Self {
        let source = SecretsManagerSource::for_region(&config.region).await;
        match config.secret_cache_ttl {
            Some(ttl) => {
                info!(ttl_seconds = ttl.as_secs(), "Secret cache enabled");
                Self::new(Arc::new(CachedSecretSource::new(source, ttl)))
            }
            None => Self::new(Arc::new(source)),
        }
    }

    /// Fetch the raw payload of `secret_name`.
    pub async fn fetch(&self, secret_name: &str) -> Result<String, SecretError> {
        self.source.get(secret_name).await.map_err(|e| {
            warn!(secret_name, kind = e.kind(), error = %e, "Failed to fetch secret");
            e
        })
    }

    /// Fetch the raw payload, turning any failure into `None`.
    pub async fn fetch_or_empty(&self, secret_name: &str) -> Option<String> {
        self.fetch(secret_name).await.ok()
    }

    pub async fn close(&self) {
        self.source.close().await;
    }
}
