/*
[INPUT]:  API credentials, stream URL, signer, nonce generator
[OUTPUT]: One-shot signed AuthRequest per connection attempt, PendingAuth tokens
[POS]:    Auth layer - socket-level identity proof for private streams
[UPDATE]: When the canonical signing string or auth frame fields change
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use url::Url;

use crate::config::{AuthVersion, Credentials};
use crate::error::{Result, StreamError};

use super::{HmacSha256Signer, NonceGenerator, Signer};

const AUTH_METHOD: &str = "GET";

/// Signed credential sent as the first frame after connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    pub api_key: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub signature: String,
}

/// Builds fresh auth requests for one stream endpoint
#[derive(Debug)]
pub struct AuthHandshake {
    api_key: String,
    signer: Arc<dyn Signer>,
    version: AuthVersion,
    host: String,
    path: String,
    nonces: NonceGenerator,
}

impl AuthHandshake {
    /// Create a handshake signing with HMAC-SHA256 over the API secret
    pub fn new(credentials: &Credentials, url: &Url, version: AuthVersion) -> Result<Self> {
        let signer = Arc::new(HmacSha256Signer::new(&credentials.api_secret));
        Self::with_signer(credentials.api_key.clone(), signer, url, version)
    }

    /// Create a handshake with a custom signing primitive
    pub fn with_signer(
        api_key: impl Into<String>,
        signer: Arc<dyn Signer>,
        url: &Url,
        version: AuthVersion,
    ) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| StreamError::Config(format!("stream url {url} has no host")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            api_key: api_key.into(),
            signer,
            version,
            host,
            path: url.path().to_string(),
            nonces: NonceGenerator::new(),
        })
    }

    pub fn version(&self) -> AuthVersion {
        self.version
    }

    /// Canonical string: method, host, path, timestamp and optional nonce, newline separated
    pub fn canonical_string(
        method: &str,
        host: &str,
        path: &str,
        timestamp: i64,
        nonce: Option<&str>,
    ) -> String {
        let mut canonical = format!("{method}\n{host}\n{path}\n{timestamp}");
        if let Some(nonce) = nonce {
            canonical.push('\n');
            canonical.push_str(nonce);
        }
        canonical
    }

    /// Sign a fresh request. Call once per connection attempt.
    pub fn prepare(&self) -> Result<AuthRequest> {
        self.prepare_at(Utc::now().timestamp_millis())
    }

    fn prepare_at(&self, timestamp: i64) -> Result<AuthRequest> {
        let nonce = match self.version {
            AuthVersion::V1 => None,
            AuthVersion::V2 => Some(self.nonces.next().to_string()),
        };
        let canonical = Self::canonical_string(
            AUTH_METHOD,
            &self.host,
            &self.path,
            timestamp,
            nonce.as_deref(),
        );
        let signature = self.signer.sign(&canonical)?;

        Ok(AuthRequest {
            api_key: self.api_key.clone(),
            timestamp,
            nonce,
            signature,
        })
    }
}

/// Auth frame sent, ack not yet received
#[derive(Debug)]
pub struct PendingAuth {
    timestamp: i64,
    sent_at: Instant,
}

impl PendingAuth {
    pub fn new(request: &AuthRequest) -> Self {
        Self {
            timestamp: request.timestamp,
            sent_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.sent_at.elapsed()
    }

    /// Consume the token with the server's verdict
    pub fn resolve(self, success: bool, message: Option<String>) -> Result<Duration> {
        if success {
            return Ok(self.elapsed());
        }
        Err(StreamError::auth(format!(
            "server rejected auth signed at {}: {}",
            self.timestamp,
            message.as_deref().unwrap_or("no reason given")
        )))
    }
}
