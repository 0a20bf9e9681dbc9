//! Signing order coordination
//!
//! Decides who may act, applies signer and request transitions to an
//! in-memory copy of a request, and emits the audit events describing them.
//! Nothing here touches storage; the manager commits the result.

use chrono::{DateTime, Utc};
use signing_types::{
    AuditAction, AuditActor, PendingAuditEvent, RequestStatus, Signature, SignatureId,
    SignatureRequest, SignerContext, SignerRequirement, SignerRequirementId, SignerStatus,
    SigningError, SigningOrder, SigningResult,
};

/// The effect of one coordinator step
#[derive(Debug, Default, Clone)]
pub struct Transition {
    /// Audit events, in the order the changes were applied
    pub events: Vec<PendingAuditEvent>,
    /// Requirements that just moved to `Sent`
    pub activated: Vec<SignerRequirementId>,
    /// Signature produced by a sign step
    pub signature: Option<Signature>,
}

impl Transition {
    /// No state changed; nothing to commit
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Material for a new signature, gathered before the state change
#[derive(Debug, Clone)]
pub struct SignatureInput {
    pub signature_data: String,
    pub document_hash: String,
    pub certificate_ref: Option<String>,
}

/// Turn-taking rules for sequential and parallel requests
#[derive(Debug, Default, Clone, Copy)]
pub struct SigningOrderCoordinator;

impl SigningOrderCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Move a fresh request to `InProgress` and send to its first signers:
    /// everyone for parallel, the lowest order for sequential.
    pub fn activate_initial_signers(
        &self,
        request: &mut SignatureRequest,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        request.transition_to(RequestStatus::InProgress, now)?;

        let targets: Vec<usize> = match request.signing_order {
            SigningOrder::Parallel => request
                .signers
                .iter()
                .enumerate()
                .filter(|(_, s)| s.status == SignerStatus::Pending)
                .map(|(i, _)| i)
                .collect(),
            SigningOrder::Sequential => next_in_line(request).into_iter().collect(),
        };

        let mut transition = Transition::default();
        for index in targets {
            activate(request, index, now, &mut transition)?;
        }
        Ok(transition)
    }

    /// Requirements that may view, sign or decline right now
    pub fn eligible_signers<'a>(&self, request: &'a SignatureRequest) -> Vec<&'a SignerRequirement> {
        if request.status != RequestStatus::InProgress {
            return Vec::new();
        }
        match request.signing_order {
            SigningOrder::Parallel => request
                .signers
                .iter()
                .filter(|s| s.status.is_awaiting_action())
                .collect(),
            SigningOrder::Sequential => request
                .signers
                .iter()
                .find(|s| !s.is_terminal())
                .filter(|s| s.status.is_awaiting_action())
                .into_iter()
                .collect(),
        }
    }

    /// Resolve `email` to a requirement that may act now, or say why not.
    pub fn ensure_can_act(
        &self,
        request: &SignatureRequest,
        email: &str,
        now: DateTime<Utc>,
    ) -> SigningResult<usize> {
        request.ensure_open()?;
        if request.is_overdue(now) {
            return Err(SigningError::RequestOverdue(request.id));
        }

        let index = find_signer(request, email)?;
        let signer = &request.signers[index];
        if signer.is_terminal() {
            return Err(not_eligible(
                signer,
                format!("signer is already {}", signer.status),
            ));
        }

        if request.signing_order == SigningOrder::Sequential {
            if let Some(current) = request.signers.iter().find(|s| !s.is_terminal()) {
                if current.id != signer.id {
                    return Err(not_eligible(
                        signer,
                        format!("waiting for signer at order {}", current.order),
                    ));
                }
            }
        }

        if signer.status == SignerStatus::Pending {
            return Err(not_eligible(signer, "signer has not been sent the request yet"));
        }
        Ok(index)
    }

    /// SENT → VIEWED. Viewing twice is a no-op.
    pub fn record_view(
        &self,
        request: &mut SignatureRequest,
        email: &str,
        context: &SignerContext,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        let index = self.ensure_can_act(request, email, now)?;
        if request.signers[index].status == SignerStatus::Viewed {
            return Ok(Transition::default());
        }

        let signer = &mut request.signers[index];
        signer.mark_viewed(now, context)?;
        let event = signer_event(request.id, signer, AuditAction::Viewed, now, context);

        Ok(Transition {
            events: vec![event],
            ..Default::default()
        })
    }

    /// Record a signature; completes the request or hands the turn on.
    pub fn record_sign(
        &self,
        request: &mut SignatureRequest,
        email: &str,
        input: SignatureInput,
        context: &SignerContext,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        let index = self.ensure_can_act(request, email, now)?;
        let request_id = request.id;

        let signer = &mut request.signers[index];
        signer.mark_signed(now, context)?;
        let signature = Signature {
            id: SignatureId::generate(),
            request_id,
            signer_requirement_id: signer.id,
            signer_email: signer.signer_email.clone(),
            signature_data: input.signature_data,
            document_hash: input.document_hash,
            signed_at: now,
            certificate_ref: input.certificate_ref,
        };
        let event = signer_event(request_id, signer, AuditAction::Signed, now, context)
            .with_metadata("signature_id", signature.id.to_string())
            .with_metadata("document_hash", signature.document_hash.clone());
        request.signatures.push(signature.clone());

        let mut transition = Transition {
            events: vec![event],
            signature: Some(signature),
            ..Default::default()
        };

        if request.all_signed() {
            request.transition_to(RequestStatus::Completed, now)?;
            transition.events.push(
                PendingAuditEvent::new(request_id, AuditActor::System, AuditAction::Completed, now)
                    .with_metadata("signatures", request.signatures.len().to_string()),
            );
        } else if request.signing_order == SigningOrder::Sequential {
            if let Some(next) = next_in_line(request) {
                activate(request, next, now, &mut transition)?;
            }
        } else {
            request.updated_at = now;
        }

        Ok(transition)
    }

    /// Any decline terminates the request and voids everyone still waiting.
    pub fn record_decline(
        &self,
        request: &mut SignatureRequest,
        email: &str,
        reason: Option<String>,
        context: &SignerContext,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        let index = self.ensure_can_act(request, email, now)?;
        let request_id = request.id;

        let signer = &mut request.signers[index];
        signer.mark_declined(now, reason.clone(), context)?;
        let event = signer_event(request_id, signer, AuditAction::Declined, now, context)
            .with_optional("reason", reason.as_deref());

        request.transition_to(RequestStatus::Declined, now)?;
        let voided = request.void_outstanding();

        Ok(Transition {
            events: vec![event.with_metadata("voided", voided.to_string())],
            ..Default::default()
        })
    }

    /// Note a reminder for a signer who is waiting to act.
    pub fn record_reminder(
        &self,
        request: &mut SignatureRequest,
        email: &str,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        request.ensure_open()?;
        if request.is_overdue(now) {
            return Err(SigningError::RequestOverdue(request.id));
        }

        let index = find_signer(request, email)?;
        let signer = &mut request.signers[index];
        if !signer.status.is_awaiting_action() {
            return Err(not_eligible(
                signer,
                format!("cannot remind a {} signer", signer.status),
            ));
        }

        signer.record_reminder(now);
        let event = PendingAuditEvent::new(request.id, AuditActor::System, AuditAction::Reminded, now)
            .with_metadata("signer", signer.signer_email.clone())
            .with_metadata("reminder_count", signer.reminder_count.to_string());
        request.updated_at = now;

        Ok(Transition {
            events: vec![event],
            ..Default::default()
        })
    }

    /// Cancel an open request on behalf of `actor_id`.
    pub fn cancel(
        &self,
        request: &mut SignatureRequest,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        request.ensure_open()?;
        request.transition_to(RequestStatus::Cancelled, now)?;
        request.cancelled_by = Some(actor_id.to_string());
        let voided = request.void_outstanding();

        let event = PendingAuditEvent::new(
            request.id,
            AuditActor::User(actor_id.to_string()),
            AuditAction::Cancelled,
            now,
        )
        .with_metadata("voided", voided.to_string());

        Ok(Transition {
            events: vec![event],
            ..Default::default()
        })
    }

    /// Expire an overdue open request. Already-terminal or not-yet-due
    /// requests are left alone.
    pub fn expire(
        &self,
        request: &mut SignatureRequest,
        now: DateTime<Utc>,
    ) -> SigningResult<Transition> {
        if request.is_terminal() || !request.is_overdue(now) {
            return Ok(Transition::default());
        }

        request.transition_to(RequestStatus::Expired, now)?;
        let voided = request.void_outstanding();

        let event = PendingAuditEvent::new(request.id, AuditActor::System, AuditAction::Expired, now)
            .with_optional(
                "expires_at",
                request.expires_at.map(|at| at.to_rfc3339()).as_deref(),
            )
            .with_metadata("voided", voided.to_string());

        Ok(Transition {
            events: vec![event],
            ..Default::default()
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn find_signer(request: &SignatureRequest, email: &str) -> SigningResult<usize> {
    request
        .signers
        .iter()
        .position(|s| s.is_signer(email))
        .ok_or_else(|| SigningError::SignerNotFound {
            request_id: request.id,
            signer_email: email.to_string(),
        })
}

/// Lowest-order requirement still `Pending`, if no one is currently waiting
fn next_in_line(request: &SignatureRequest) -> Option<usize> {
    if request.signers.iter().any(|s| s.status.is_awaiting_action()) {
        return None;
    }
    request
        .signers
        .iter()
        .position(|s| s.status == SignerStatus::Pending)
}

fn activate(
    request: &mut SignatureRequest,
    index: usize,
    now: DateTime<Utc>,
    transition: &mut Transition,
) -> SigningResult<()> {
    let request_id = request.id;
    let signer = &mut request.signers[index];
    signer.activate(now)?;
    transition.activated.push(signer.id);
    transition.events.push(
        PendingAuditEvent::new(request_id, AuditActor::System, AuditAction::Sent, now)
            .with_metadata("signer", signer.signer_email.clone())
            .with_metadata("order", signer.order.to_string()),
    );
    request.updated_at = now;
    Ok(())
}

fn signer_event(
    request_id: signing_types::RequestId,
    signer: &SignerRequirement,
    action: AuditAction,
    now: DateTime<Utc>,
    context: &SignerContext,
) -> PendingAuditEvent {
    PendingAuditEvent::new(
        request_id,
        AuditActor::Signer(signer.signer_email.clone()),
        action,
        now,
    )
    .with_optional("ip_address", context.ip_address.as_deref())
    .with_optional("user_agent", context.user_agent.as_deref())
}

fn not_eligible(signer: &SignerRequirement, reason: impl Into<String>) -> SigningError {
    SigningError::NotEligible {
        signer_email: signer.signer_email.clone(),
        reason: reason.into(),
    }
}
