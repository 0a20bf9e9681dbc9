//! Signer requirements: one party's obligation to sign or decline

use crate::{RequestId, SignerRequirementId, SigningError, SigningResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Authentication Method ────────────────────────────────────────────

/// How a signer proves their identity before a signature is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationMethod {
    EmailVerification,
    TwoFactorAuth,
    SmsOtp,
    Biometric,
}

impl AuthenticationMethod {
    pub const ALL: [AuthenticationMethod; 4] = [
        AuthenticationMethod::EmailVerification,
        AuthenticationMethod::TwoFactorAuth,
        AuthenticationMethod::SmsOtp,
        AuthenticationMethod::Biometric,
    ];
}

impl Default for AuthenticationMethod {
    fn default() -> Self {
        AuthenticationMethod::EmailVerification
    }
}

impl std::fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthenticationMethod::EmailVerification => "EMAIL_VERIFICATION",
            AuthenticationMethod::TwoFactorAuth => "TWO_FACTOR_AUTH",
            AuthenticationMethod::SmsOtp => "SMS_OTP",
            AuthenticationMethod::Biometric => "BIOMETRIC",
        };
        f.write_str(name)
    }
}

// ── Signer Status ────────────────────────────────────────────────────

/// Status of a single signer requirement.
///
/// Forward-only: `Pending → Sent → Viewed → Signed`, with `Declined`
/// reachable from `Sent`/`Viewed` and `Voided` (closed by cascade from a
/// terminal request) reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerStatus {
    Pending,
    Sent,
    Viewed,
    Signed,
    Declined,
    Voided,
}

impl SignerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignerStatus::Signed | SignerStatus::Declined | SignerStatus::Voided
        )
    }

    /// Activated and waiting for the signer to act.
    pub fn is_awaiting_action(&self) -> bool {
        matches!(self, SignerStatus::Sent | SignerStatus::Viewed)
    }

    pub fn can_transition_to(&self, next: SignerStatus) -> bool {
        use SignerStatus::*;
        matches!(
            (self, next),
            (Pending, Sent)
                | (Pending, Voided)
                | (Sent, Viewed)
                | (Sent, Signed)
                | (Sent, Declined)
                | (Sent, Voided)
                | (Viewed, Signed)
                | (Viewed, Declined)
                | (Viewed, Voided)
        )
    }

    /// Validate and return the next status.
    pub fn transition(self, next: SignerStatus) -> SigningResult<SignerStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SigningError::InvalidSignerTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SignerStatus::Pending => "PENDING",
            SignerStatus::Sent => "SENT",
            SignerStatus::Viewed => "VIEWED",
            SignerStatus::Signed => "SIGNED",
            SignerStatus::Declined => "DECLINED",
            SignerStatus::Voided => "VOIDED",
        };
        f.write_str(name)
    }
}

// ── Signer Context ───────────────────────────────────────────────────

/// Where a signer action came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl SignerContext {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

// ── Signer Spec (creation input) ─────────────────────────────────────

/// One entry of the signer list passed to `create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSpec {
    pub email: String,
    pub name: String,
    /// Explicit position; assigned from list position when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default)]
    pub authentication_method: AuthenticationMethod,
}

impl SignerSpec {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            order: None,
            authentication_method: AuthenticationMethod::default(),
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_method(mut self, method: AuthenticationMethod) -> Self {
        self.authentication_method = method;
        self
    }
}

// ── Signer Requirement ───────────────────────────────────────────────

/// A single signer's obligation within a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRequirement {
    pub id: SignerRequirementId,
    /// Back-reference to the owning request
    pub request_id: RequestId,
    pub signer_email: String,
    pub signer_name: String,
    /// Position in the signing order; unique and fixed at creation
    pub order: u32,
    pub authentication_method: AuthenticationMethod,
    pub status: SignerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reminded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_count: u32,
}

impl SignerRequirement {
    pub fn new(request_id: RequestId, spec: &SignerSpec, order: u32) -> Self {
        Self {
            id: SignerRequirementId::generate(),
            request_id,
            signer_email: spec.email.trim().to_string(),
            signer_name: spec.name.trim().to_string(),
            order,
            authentication_method: spec.authentication_method,
            status: SignerStatus::Pending,
            sent_at: None,
            viewed_at: None,
            signed_at: None,
            declined_at: None,
            decline_reason: None,
            ip_address: None,
            user_agent: None,
            last_reminded_at: None,
            reminder_count: 0,
        }
    }

    /// Case-insensitive e-mail match
    pub fn is_signer(&self, email: &str) -> bool {
        self.signer_email.eq_ignore_ascii_case(email.trim())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// PENDING → SENT
    pub fn activate(&mut self, now: DateTime<Utc>) -> SigningResult<()> {
        self.status = self.status.transition(SignerStatus::Sent)?;
        self.sent_at = Some(now);
        Ok(())
    }

    /// SENT → VIEWED
    pub fn mark_viewed(&mut self, now: DateTime<Utc>, context: &SignerContext) -> SigningResult<()> {
        self.status = self.status.transition(SignerStatus::Viewed)?;
        self.viewed_at = Some(now);
        self.apply_context(context);
        Ok(())
    }

    /// SENT | VIEWED → SIGNED
    pub fn mark_signed(&mut self, now: DateTime<Utc>, context: &SignerContext) -> SigningResult<()> {
        self.status = self.status.transition(SignerStatus::Signed)?;
        self.signed_at = Some(now);
        self.apply_context(context);
        Ok(())
    }

    /// SENT | VIEWED → DECLINED
    pub fn mark_declined(
        &mut self,
        now: DateTime<Utc>,
        reason: Option<String>,
        context: &SignerContext,
    ) -> SigningResult<()> {
        self.status = self.status.transition(SignerStatus::Declined)?;
        self.declined_at = Some(now);
        self.decline_reason = reason;
        self.apply_context(context);
        Ok(())
    }

    /// Close a non-terminal requirement after its request terminated.
    /// Returns `false` when the requirement was already terminal.
    pub fn void(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SignerStatus::Voided;
        true
    }

    pub fn record_reminder(&mut self, now: DateTime<Utc>) {
        self.last_reminded_at = Some(now);
        self.reminder_count += 1;
    }

    fn apply_context(&mut self, context: &SignerContext) {
        if let Some(ip) = &context.ip_address {
            self.ip_address = Some(ip.clone());
        }
        if let Some(agent) = &context.user_agent {
            self.user_agent = Some(agent.clone());
        }
    }
}
