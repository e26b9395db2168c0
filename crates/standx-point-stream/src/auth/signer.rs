/*
[INPUT]:  Canonical signing string and API secret bytes
[OUTPUT]: Base64-encoded HMAC-SHA256 signatures
[POS]:    Auth layer - signing primitive for the socket auth handshake
[UPDATE]: When changing signing algorithm or signature encoding
*/

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, StreamError};

type HmacSha256 = Hmac<Sha256>;

/// Signs canonical auth strings
pub trait Signer: Send + Sync + fmt::Debug {
    /// Sign `payload` and return the encoded signature
    fn sign(&self, payload: &str) -> Result<String>;
}

/// HMAC-SHA256 signer keyed by the API secret
#[derive(Clone)]
pub struct HmacSha256Signer {
    secret: Vec<u8>,
}

impl HmacSha256Signer {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }
}

impl fmt::Debug for HmacSha256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSha256Signer")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Signer for HmacSha256Signer {
    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StreamError::auth(format!("invalid HMAC key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}
