//! Verification channels

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signing_types::{AuthenticationMethod, RequestId, SignerRequirementId};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;

/// Identity proof submitted by a signer (OTP code, link token, attestation)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthProof(String);

impl AuthProof {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The proof without surrounding whitespace
    pub fn as_str(&self) -> &str {
        self.0.trim()
    }
}

// Proofs are secrets; keep them out of logs.
impl fmt::Debug for AuthProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthProof(***)")
    }
}

/// What is being verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub request_id: RequestId,
    pub signer_requirement_id: SignerRequirementId,
    pub signer_email: String,
    pub method: AuthenticationMethod,
}

/// Errors from authenticators and channels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthChannelError {
    /// The proof cannot be valid for this method; not retried.
    #[error("malformed proof: {0}")]
    Malformed(String),

    /// Transient failure; retried once.
    #[error("verification channel unavailable: {0}")]
    Unavailable(String),
}

/// Backend that decides whether a proof is valid
#[async_trait]
pub trait VerificationChannel: Send + Sync {
    async fn check(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError>;
}

/// Channel holding enrolled per-signer secrets
#[derive(Debug, Default)]
pub struct InMemoryVerificationChannel {
    secrets: RwLock<HashMap<(String, AuthenticationMethod), String>>,
}

impl InMemoryVerificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll(
        &self,
        email: &str,
        method: AuthenticationMethod,
        secret: impl Into<String>,
    ) {
        let mut secrets = self.secrets.write().unwrap_or_else(|p| p.into_inner());
        secrets.insert((email.trim().to_ascii_lowercase(), method), secret.into());
    }
}

#[async_trait]
impl VerificationChannel for InMemoryVerificationChannel {
    async fn check(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError> {
        let secrets = self
            .secrets
            .read()
            .map_err(|_| AuthChannelError::Unavailable("secret table lock poisoned".into()))?;
        let key = (challenge.signer_email.to_ascii_lowercase(), challenge.method);
        Ok(secrets
            .get(&key)
            .is_some_and(|secret| secret == proof.as_str()))
    }
}

/// Channel accepting one shared code for every signer. Development only.
#[derive(Clone)]
pub struct SharedSecretChannel {
    secret: String,
}

impl SharedSecretChannel {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl VerificationChannel for SharedSecretChannel {
    async fn check(
        &self,
        _challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError> {
        Ok(!self.secret.is_empty() && proof.as_str() == self.secret)
    }
}
