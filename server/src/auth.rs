//! Identity-verification boundary.
//!
//! Credential issuance and validation live outside this crate. The server
//! only needs a single function at connection admission: turn an opaque
//! credential into a username or refuse the connection. Deployments plug in
//! their own verifier; the default accepts everyone as a guest.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("expired credential")]
    Expired,
}

/// Resolves connection credentials to a verified username.
pub trait IdentityVerifier: Send + Sync {
    fn verify_identity(&self, credential: &str) -> Result<String, AuthError>;
}

/// Accepts any connection and names it after its credential.
///
/// Stand-in for a real token verifier in development and load testing.
pub struct AllowAnonymous;

impl IdentityVerifier for AllowAnonymous {
    fn verify_identity(&self, credential: &str) -> Result<String, AuthError> {
        Ok(format!("guest-{}", credential))
    }
}
