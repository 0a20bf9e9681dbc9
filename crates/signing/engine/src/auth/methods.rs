//! One authenticator per authentication method

use super::channel::{AuthChannelError, AuthChallenge, AuthProof, VerificationChannel};
use async_trait::async_trait;
use signing_types::AuthenticationMethod;
use std::sync::Arc;

/// Verifies a signer's identity for one method
#[async_trait]
pub trait SignerAuthenticator: Send + Sync {
    fn method(&self) -> AuthenticationMethod;

    /// `Ok(true)` accepted, `Ok(false)` rejected
    async fn verify(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError>;
}

fn numeric_code(proof: &AuthProof, min: usize, max: usize) -> Result<(), AuthChannelError> {
    let code = proof.as_str();
    if code.len() < min || code.len() > max || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthChannelError::Malformed(format!(
            "expected a {}-{} digit code",
            min, max
        )));
    }
    Ok(())
}

fn non_blank(proof: &AuthProof) -> Result<(), AuthChannelError> {
    if proof.as_str().is_empty() {
        return Err(AuthChannelError::Malformed("empty proof".into()));
    }
    Ok(())
}

/// E-mail link token
pub struct EmailVerificationAuthenticator {
    channel: Arc<dyn VerificationChannel>,
}

impl EmailVerificationAuthenticator {
    pub fn new(channel: Arc<dyn VerificationChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SignerAuthenticator for EmailVerificationAuthenticator {
    fn method(&self) -> AuthenticationMethod {
        AuthenticationMethod::EmailVerification
    }

    async fn verify(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError> {
        non_blank(proof)?;
        self.channel.check(challenge, proof).await
    }
}

/// Authenticator-app TOTP code
pub struct TwoFactorAuthenticator {
    channel: Arc<dyn VerificationChannel>,
}

impl TwoFactorAuthenticator {
    pub fn new(channel: Arc<dyn VerificationChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SignerAuthenticator for TwoFactorAuthenticator {
    fn method(&self) -> AuthenticationMethod {
        AuthenticationMethod::TwoFactorAuth
    }

    async fn verify(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError> {
        numeric_code(proof, 6, 8)?;
        self.channel.check(challenge, proof).await
    }
}

/// One-time code delivered by SMS
pub struct SmsOtpAuthenticator {
    channel: Arc<dyn VerificationChannel>,
}

impl SmsOtpAuthenticator {
    pub fn new(channel: Arc<dyn VerificationChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SignerAuthenticator for SmsOtpAuthenticator {
    fn method(&self) -> AuthenticationMethod {
        AuthenticationMethod::SmsOtp
    }

    async fn verify(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError> {
        numeric_code(proof, 4, 8)?;
        self.channel.check(challenge, proof).await
    }
}

/// Device biometric attestation
pub struct BiometricAuthenticator {
    channel: Arc<dyn VerificationChannel>,
}

impl BiometricAuthenticator {
    pub fn new(channel: Arc<dyn VerificationChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SignerAuthenticator for BiometricAuthenticator {
    fn method(&self) -> AuthenticationMethod {
        AuthenticationMethod::Biometric
    }

    async fn verify(
        &self,
        challenge: &AuthChallenge,
        proof: &AuthProof,
    ) -> Result<bool, AuthChannelError> {
        non_blank(proof)?;
        self.channel.check(challenge, proof).await
    }
}
