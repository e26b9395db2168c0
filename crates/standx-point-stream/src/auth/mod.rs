/*
[INPUT]:  API credentials and stream URL
[OUTPUT]: Signed auth requests, signing primitives, nonces
[POS]:    Auth layer - handles socket-level authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod handshake;
pub mod nonce;
pub mod signer;

pub use handshake::{AuthHandshake, AuthRequest, PendingAuth};
pub use nonce::NonceGenerator;
pub use signer::{HmacSha256Signer, Signer};
