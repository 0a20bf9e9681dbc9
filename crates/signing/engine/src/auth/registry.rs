//! Authenticator registry

use super::channel::{AuthChannelError, AuthChallenge, AuthProof, VerificationChannel};
use super::methods::{
    BiometricAuthenticator, EmailVerificationAuthenticator, SignerAuthenticator,
    SmsOtpAuthenticator, TwoFactorAuthenticator,
};
use signing_types::{AuthenticationMethod, SigningError, SigningResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Attempts per verification: the first call plus one retry
const MAX_ATTEMPTS: u32 = 2;

/// Routes each challenge to the authenticator for its method.
///
/// Every attempt is bounded by `timeout`. A timeout or unavailable channel is
/// retried once; a rejection or malformed proof is not.
#[derive(Clone)]
pub struct AuthenticatorRegistry {
    authenticators: HashMap<AuthenticationMethod, Arc<dyn SignerAuthenticator>>,
    timeout: Duration,
}

impl AuthenticatorRegistry {
    /// Empty registry; every method fails until registered
    pub fn new(timeout: Duration) -> Self {
        Self {
            authenticators: HashMap::new(),
            timeout,
        }
    }

    /// All four methods backed by one channel
    pub fn with_channel(channel: Arc<dyn VerificationChannel>, timeout: Duration) -> Self {
        let mut registry = Self::new(timeout);
        registry.register(Arc::new(EmailVerificationAuthenticator::new(channel.clone())));
        registry.register(Arc::new(TwoFactorAuthenticator::new(channel.clone())));
        registry.register(Arc::new(SmsOtpAuthenticator::new(channel.clone())));
        registry.register(Arc::new(BiometricAuthenticator::new(channel)));
        registry
    }

    /// Register (or replace) the authenticator for its method
    pub fn register(&mut self, authenticator: Arc<dyn SignerAuthenticator>) {
        self.authenticators
            .insert(authenticator.method(), authenticator);
    }

    pub fn supports(&self, method: AuthenticationMethod) -> bool {
        self.authenticators.contains_key(&method)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verify a signer's proof; any failure is `SigningError::Authentication`.
    pub async fn verify(&self, challenge: &AuthChallenge, proof: &AuthProof) -> SigningResult<()> {
        let authenticator = self.authenticators.get(&challenge.method).ok_or_else(|| {
            SigningError::Authentication(format!(
                "no authenticator registered for {}",
                challenge.method
            ))
        })?;

        let mut last_failure = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match tokio::time::timeout(self.timeout, authenticator.verify(challenge, proof)).await
            {
                Ok(Ok(true)) => {
                    tracing::debug!(
                        request_id = %challenge.request_id,
                        method = %challenge.method,
                        "Signer identity verified"
                    );
                    return Ok(());
                }
                Ok(Ok(false)) => {
                    return Err(SigningError::Authentication(format!(
                        "{} proof rejected",
                        challenge.method
                    )));
                }
                Ok(Err(AuthChannelError::Malformed(reason))) => {
                    return Err(SigningError::Authentication(reason));
                }
                Ok(Err(err @ AuthChannelError::Unavailable(_))) => {
                    last_failure = err.to_string();
                }
                Err(_) => {
                    last_failure = format!(
                        "verification timed out after {}ms",
                        self.timeout.as_millis()
                    );
                }
            }

            tracing::warn!(
                request_id = %challenge.request_id,
                method = %challenge.method,
                attempt,
                reason = %last_failure,
                "Signer verification attempt failed"
            );
        }

        Err(SigningError::Authentication(last_failure))
    }
}
