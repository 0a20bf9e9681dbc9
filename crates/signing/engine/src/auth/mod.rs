//! Signer identity verification
//!
//! Each [`AuthenticationMethod`](signing_types::AuthenticationMethod) has its
//! own authenticator. Authenticators check the proof's shape and delegate
//! the actual check to a [`VerificationChannel`] (OTP service, e-mail link
//! service, device attestation). The [`AuthenticatorRegistry`] applies the
//! timeout and single retry around every verification.

mod channel;
mod methods;
mod registry;

pub use channel::{
    AuthChannelError, AuthChallenge, AuthProof, InMemoryVerificationChannel,
    SharedSecretChannel, VerificationChannel,
};
pub use methods::{
    BiometricAuthenticator, EmailVerificationAuthenticator, SignerAuthenticator,
    SmsOtpAuthenticator, TwoFactorAuthenticator,
};
pub use registry::AuthenticatorRegistry;
