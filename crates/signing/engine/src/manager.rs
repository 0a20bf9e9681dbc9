//! Signature request manager
//!
//! Entry point for every operation on a signature request. Each mutation is
//! a bounded read-compute-write cycle: load the request, let the coordinator
//! apply the change to a copy, then commit conditionally on the version read.

use crate::auth::{AuthChallenge, AuthProof, AuthenticatorRegistry};
use crate::clock::{Clock, SystemClock};
use crate::collaborators::{
    document_digest, CertificateGenerator, DocumentStore, LoggingNotifier, Notification,
    NotificationDispatcher,
};
use crate::config::EngineConfig;
use crate::coordinator::{SignatureInput, SigningOrderCoordinator, Transition};
use crate::storage::{RequestStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use signing_audit::{AuditRecorder, ChainVerification};
use signing_types::{
    AuditAction, AuditActor, AuditEvent, DocumentRef, PendingAuditEvent, RequestId,
    RequestStatus, Signature, SignatureRequest, SignatureType, SignerContext, SignerRequirement,
    SignerSpec, SigningError, SigningOrder, SigningResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

/// Capacity of the committed-event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Input for creating a signature request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSignatureRequest {
    pub document_ref: DocumentRef,
    pub signature_type: SignatureType,
    pub signing_order: SigningOrder,
    pub signers: Vec<SignerSpec>,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
    /// Recorded as the actor of the CREATED event
    #[serde(default)]
    pub created_by: Option<String>,
}

impl CreateSignatureRequest {
    pub fn new(
        document_ref: impl Into<String>,
        signature_type: SignatureType,
        signing_order: SigningOrder,
        signers: Vec<SignerSpec>,
    ) -> Self {
        Self {
            document_ref: DocumentRef::new(document_ref),
            signature_type,
            signing_order,
            signers,
            expires_in_days: None,
            message: None,
            created_by: None,
        }
    }

    pub fn expires_in_days(mut self, days: u32) -> Self {
        self.expires_in_days = Some(days);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn created_by(mut self, actor_id: impl Into<String>) -> Self {
        self.created_by = Some(actor_id.into());
        self
    }
}

/// Result of one read-compute-write cycle
struct Committed {
    request: SignatureRequest,
    transition: Transition,
    previous_status: RequestStatus,
    applied: bool,
}

/// Manages signature requests end to end
pub struct SignatureRequestManager {
    config: EngineConfig,
    store: Arc<dyn RequestStore>,
    audit: Arc<dyn AuditRecorder>,
    coordinator: SigningOrderCoordinator,
    authenticators: AuthenticatorRegistry,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    certificates: Option<Arc<dyn CertificateGenerator>>,
    clock: Arc<dyn Clock>,
    event_tx: broadcast::Sender<AuditEvent>,
}

impl SignatureRequestManager {
    pub fn builder(
        store: Arc<dyn RequestStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> SignatureRequestManagerBuilder {
        SignatureRequestManagerBuilder::new(store, documents)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Subscribe to audit events as they are committed
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.event_tx.subscribe()
    }

    // ── Creation ────────────────────────────────────────────────────────────

    /// Validate, persist and activate a new request.
    #[instrument(skip(self, input), fields(document_ref = %input.document_ref))]
    pub async fn create(&self, input: CreateSignatureRequest) -> SigningResult<SignatureRequest> {
        let orders = validate_create(&input, &self.config)?;
        let now = self.clock.now();
        let id = RequestId::generate();

        let signers = input
            .signers
            .iter()
            .zip(orders)
            .map(|(spec, order)| SignerRequirement::new(id, spec, order))
            .collect();
        let mut request = SignatureRequest::new(
            id,
            DocumentRef::new(input.document_ref.as_str().trim()),
            input.signature_type,
            input.signing_order,
            signers,
            now,
        );
        if let Some(days) = input.expires_in_days {
            request = request.with_expiry(now + Duration::days(i64::from(days)));
        }
        if let Some(message) = input.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            request = request.with_message(message);
        }

        let actor = match input.created_by.as_deref().map(str::trim) {
            Some(actor) if !actor.is_empty() => AuditActor::User(actor.to_string()),
            _ => AuditActor::System,
        };
        let mut events = vec![PendingAuditEvent::new(id, actor, AuditAction::Created, now)
            .with_metadata("document_ref", request.document_ref.to_string())
            .with_metadata("signing_order", request.signing_order.to_string())
            .with_metadata("signers", request.signers.len().to_string())];

        let activation = self.coordinator.activate_initial_signers(&mut request, now)?;
        events.extend(activation.events.iter().cloned());

        request.version = 1;
        let recorded = self.store.insert(request.clone(), events).await?;
        self.publish(recorded);

        info!(
            request_id = %request.id,
            signing_order = %request.signing_order,
            signers = request.signers.len(),
            "Signature request created"
        );

        for signer_id in &activation.activated {
            if let Some(signer) = request.signers.iter().find(|s| s.id == *signer_id) {
                self.notify(Notification::signing_requested(&request, signer))
                    .await;
            }
        }

        Ok(request)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// The request with all of its requirements and signatures
    pub async fn get_status(&self, request_id: &RequestId) -> SigningResult<SignatureRequest> {
        self.load(request_id).await
    }

    pub async fn get_requests_for_document(
        &self,
        document_ref: &DocumentRef,
    ) -> SigningResult<Vec<SignatureRequest>> {
        Ok(self.store.list_for_document(document_ref).await?)
    }

    pub async fn get_signatures(&self, request_id: &RequestId) -> SigningResult<Vec<Signature>> {
        Ok(self.load(request_id).await?.signatures)
    }

    /// Requirements that may view, sign or decline right now
    pub async fn eligible_signers(
        &self,
        request_id: &RequestId,
    ) -> SigningResult<Vec<SignerRequirement>> {
        let request = self.load(request_id).await?;
        if request.is_overdue(self.clock.now()) {
            return Ok(Vec::new());
        }
        Ok(self
            .coordinator
            .eligible_signers(&request)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Audit events in the order they were applied
    pub async fn get_audit_trail(&self, request_id: &RequestId) -> SigningResult<Vec<AuditEvent>> {
        self.load(request_id).await?;
        Ok(self.audit.list_for_request(request_id)?)
    }

    /// Recompute the request's audit hash chain
    pub async fn verify_audit_trail(
        &self,
        request_id: &RequestId,
    ) -> SigningResult<ChainVerification> {
        self.load(request_id).await?;
        Ok(self.audit.verify(request_id)?)
    }

    /// Open requests past their expiry
    pub async fn list_overdue(&self) -> SigningResult<Vec<RequestId>> {
        Ok(self.store.list_overdue(self.clock.now()).await?)
    }

    // ── Owner actions ───────────────────────────────────────────────────────

    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn cancel(
        &self,
        request_id: &RequestId,
        actor_id: &str,
    ) -> SigningResult<SignatureRequest> {
        let actor_id = actor_id.trim();
        if actor_id.is_empty() {
            return Err(SigningError::Validation("actor id must not be blank".into()));
        }

        let committed = self
            .mutate(request_id, |request, now| {
                self.coordinator.cancel(request, actor_id, now)
            })
            .await?;

        info!(actor = actor_id, "Signature request cancelled");
        self.announce(&committed).await;
        Ok(committed.request)
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn send_reminder(
        &self,
        request_id: &RequestId,
        signer_email: &str,
    ) -> SigningResult<SignatureRequest> {
        let committed = self
            .mutate(request_id, |request, now| {
                self.coordinator.record_reminder(request, signer_email, now)
            })
            .await?;

        if let Some(signer) = committed.request.signer(signer_email) {
            debug!(count = signer.reminder_count, "Reminder recorded");
            self.notify(Notification::reminder(&committed.request, signer))
                .await;
        }
        Ok(committed.request)
    }

    // ── Signer actions ──────────────────────────────────────────────────────

    #[instrument(skip(self, context), fields(request_id = %request_id))]
    pub async fn view_document(
        &self,
        request_id: &RequestId,
        signer_email: &str,
        context: SignerContext,
    ) -> SigningResult<SignatureRequest> {
        let committed = self
            .mutate(request_id, |request, now| {
                self.coordinator
                    .record_view(request, signer_email, &context, now)
            })
            .await?;
        Ok(committed.request)
    }

    /// Authenticate the signer, hash the document and record the signature.
    ///
    /// Authentication happens once, before the commit loop; eligibility is
    /// re-checked on every attempt.
    #[instrument(skip(self, signature_data, proof, context), fields(request_id = %request_id))]
    pub async fn sign_document(
        &self,
        request_id: &RequestId,
        signer_email: &str,
        signature_data: &str,
        proof: &AuthProof,
        context: SignerContext,
    ) -> SigningResult<Signature> {
        if signature_data.trim().is_empty() {
            return Err(SigningError::Validation(
                "signature data must not be blank".into(),
            ));
        }

        let request = self.load(request_id).await?;
        let index = self
            .coordinator
            .ensure_can_act(&request, signer_email, self.clock.now())?;
        let signer = request.signers[index].clone();

        let challenge = AuthChallenge {
            request_id: request.id,
            signer_requirement_id: signer.id,
            signer_email: signer.signer_email.clone(),
            method: signer.authentication_method,
        };
        self.authenticators.verify(&challenge, proof).await?;

        let document_hash = self.hash_document(&request.document_ref).await?;
        let input = SignatureInput {
            signature_data: signature_data.to_string(),
            document_hash,
            certificate_ref: self.signer_certificate(&request, &signer).await,
        };

        let committed = self
            .mutate(request_id, |request, now| {
                self.coordinator
                    .record_sign(request, signer_email, input.clone(), &context, now)
            })
            .await?;
        let signature = committed.transition.signature.clone().ok_or_else(|| {
            SigningError::Storage("sign committed without producing a signature".into())
        })?;

        info!(
            signer = %signature.signer_email,
            signature_id = %signature.id,
            status = %committed.request.status,
            "Document signed"
        );

        self.announce(&committed).await;
        if committed.request.status == RequestStatus::Completed {
            self.attach_completion_certificate(&committed.request).await;
        }
        Ok(signature)
    }

    #[instrument(skip(self, reason, context), fields(request_id = %request_id))]
    pub async fn decline_signature(
        &self,
        request_id: &RequestId,
        signer_email: &str,
        reason: Option<String>,
        context: SignerContext,
    ) -> SigningResult<SignatureRequest> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let committed = self
            .mutate(request_id, |request, now| {
                self.coordinator
                    .record_decline(request, signer_email, reason.clone(), &context, now)
            })
            .await?;

        info!(signer = signer_email, "Signature declined");
        self.announce(&committed).await;
        Ok(committed.request)
    }

    // ── Clock-driven ────────────────────────────────────────────────────────

    /// Expire the request if it is open and overdue. Returns whether this
    /// call performed the transition.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn expire_request(&self, request_id: &RequestId) -> SigningResult<bool> {
        let committed = self
            .mutate(request_id, |request, now| self.coordinator.expire(request, now))
            .await?;

        if committed.applied {
            info!("Signature request expired");
            self.announce(&committed).await;
        }
        Ok(committed.applied)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn load(&self, request_id: &RequestId) -> SigningResult<SignatureRequest> {
        self.store
            .get(request_id)
            .await?
            .ok_or(SigningError::RequestNotFound(*request_id))
    }

    /// Bounded optimistic read-compute-write cycle.
    ///
    /// Business-rule errors from `step` surface immediately. Only version
    /// collisions are retried.
    async fn mutate<F>(&self, request_id: &RequestId, mut step: F) -> SigningResult<Committed>
    where
        F: FnMut(&mut SignatureRequest, DateTime<Utc>) -> SigningResult<Transition>,
    {
        let attempts = self.config.max_commit_attempts();
        for attempt in 1..=attempts {
            let current = self.load(request_id).await?;
            let now = self.clock.now();
            let mut next = current.clone();
            let transition = step(&mut next, now)?;

            if next == current {
                return Ok(Committed {
                    request: current.clone(),
                    transition,
                    previous_status: current.status,
                    applied: false,
                });
            }

            next.version = current.version + 1;
            next.updated_at = now;
            match self
                .store
                .commit(current.version, next.clone(), transition.events.clone())
                .await
            {
                Ok(recorded) => {
                    debug!(version = next.version, events = recorded.len(), "Request committed");
                    self.publish(recorded);
                    return Ok(Committed {
                        request: next,
                        transition,
                        previous_status: current.status,
                        applied: true,
                    });
                }
                Err(StorageError::VersionConflict { actual, .. }) => {
                    debug!(attempt, expected = current.version, actual, "Commit collided, retrying");
                    tokio::task::yield_now().await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(request_id = %request_id, attempts, "Giving up after repeated commit collisions");
        Err(SigningError::ConcurrentModification {
            request_id: *request_id,
            attempts,
        })
    }

    fn publish(&self, events: Vec<AuditEvent>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.event_tx.send(event);
        }
    }

    /// Notifications that follow a commit: newly activated signers, and
    /// everyone when the request just closed.
    async fn announce(&self, committed: &Committed) {
        if !committed.applied {
            return;
        }
        let request = &committed.request;

        for signer_id in &committed.transition.activated {
            if let Some(signer) = request.signers.iter().find(|s| s.id == *signer_id) {
                self.notify(Notification::signing_requested(request, signer))
                    .await;
            }
        }

        if request.is_terminal() && !committed.previous_status.is_terminal() {
            for signer in &request.signers {
                self.notify(Notification::request_closed(request, &signer.signer_email))
                    .await;
            }
        }
    }

    /// Deliver a notification; failures are logged, never propagated.
    async fn notify(&self, notification: Notification) {
        let kind = notification.kind();
        let recipient = notification.recipient().to_string();
        match tokio::time::timeout(
            self.config.collaborator_timeout(),
            self.notifier.dispatch(notification),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(kind, recipient = %recipient, error = %e, "Notification failed"),
            Err(_) => warn!(kind, recipient = %recipient, "Notification timed out"),
        }
    }

    async fn hash_document(&self, document_ref: &DocumentRef) -> SigningResult<String> {
        match tokio::time::timeout(
            self.config.collaborator_timeout(),
            self.documents.fetch(document_ref),
        )
        .await
        {
            Ok(Ok(content)) => Ok(document_digest(&content)),
            Ok(Err(e)) => Err(SigningError::DocumentUnavailable(format!(
                "{}: {}",
                document_ref, e
            ))),
            Err(_) => Err(SigningError::DocumentUnavailable(format!(
                "{}: timed out",
                document_ref
            ))),
        }
    }

    async fn signer_certificate(
        &self,
        request: &SignatureRequest,
        signer: &SignerRequirement,
    ) -> Option<String> {
        let generator = self.certificates.as_ref()?;
        match tokio::time::timeout(
            self.config.collaborator_timeout(),
            generator.signer_certificate(request, signer),
        )
        .await
        {
            Ok(Ok(reference)) => reference,
            Ok(Err(e)) => {
                warn!(error = %e, "Signer certificate generation failed");
                None
            }
            Err(_) => {
                warn!("Signer certificate generation timed out");
                None
            }
        }
    }

    async fn attach_completion_certificate(&self, request: &SignatureRequest) {
        let Some(generator) = self.certificates.as_ref() else {
            return;
        };

        let reference = match tokio::time::timeout(
            self.config.collaborator_timeout(),
            generator.completion_certificate(request),
        )
        .await
        {
            Ok(Ok(reference)) => reference,
            Ok(Err(e)) => {
                warn!(request_id = %request.id, error = %e, "Completion certificate failed");
                return;
            }
            Err(_) => {
                warn!(request_id = %request.id, "Completion certificate timed out");
                return;
            }
        };

        let result = self
            .mutate(&request.id, |current, _| {
                if current.certificate_ref.is_none() {
                    current.certificate_ref = Some(reference.clone());
                }
                Ok(Transition::default())
            })
            .await;
        match result {
            Ok(_) => info!(request_id = %request.id, certificate = %reference, "Completion certificate attached"),
            Err(e) => warn!(request_id = %request.id, error = %e, "Failed to attach completion certificate"),
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────────────

/// Check create input; returns the order assigned to each signer.
fn validate_create(input: &CreateSignatureRequest, config: &EngineConfig) -> SigningResult<Vec<u32>> {
    let invalid = |msg: String| Err(SigningError::Validation(msg));

    if input.document_ref.is_blank() {
        return invalid("document reference must not be blank".into());
    }
    if input.signers.is_empty() {
        return invalid("at least one signer is required".into());
    }
    if let Some(days) = input.expires_in_days {
        if days > config.max_expiry_days {
            return invalid(format!(
                "expires_in_days must be at most {}",
                config.max_expiry_days
            ));
        }
    }

    let mut seen = HashSet::new();
    for (position, signer) in input.signers.iter().enumerate() {
        let email = signer.email.trim();
        if email.is_empty() {
            return invalid(format!("signer {} has a blank email", position + 1));
        }
        if signer.name.trim().is_empty() {
            return invalid(format!("signer {} has a blank name", position + 1));
        }
        if !is_plausible_email(email) {
            return invalid(format!("signer email '{}' is not an address", email));
        }
        if !seen.insert(email.to_ascii_lowercase()) {
            return invalid(format!("signer email '{}' appears more than once", email));
        }
    }

    let given: Vec<u32> = input.signers.iter().filter_map(|s| s.order).collect();
    let orders: Vec<u32> = if given.is_empty() {
        (1..=input.signers.len() as u32).collect()
    } else if given.len() != input.signers.len() {
        return invalid("either every signer has an order or none does".into());
    } else {
        given
    };

    if orders.contains(&0) {
        return invalid("signer order starts at 1".into());
    }
    let mut sorted = orders.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != orders.len() {
        return invalid("signer orders must be unique".into());
    }
    if input.signing_order == SigningOrder::Sequential
        && sorted.iter().enumerate().any(|(i, order)| *order != i as u32 + 1)
    {
        return invalid("sequential signer orders must be contiguous from 1".into());
    }

    Ok(orders)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Builder for [`SignatureRequestManager`]
pub struct SignatureRequestManagerBuilder {
    store: Arc<dyn RequestStore>,
    documents: Arc<dyn DocumentStore>,
    config: Option<EngineConfig>,
    authenticators: Option<AuthenticatorRegistry>,
    notifier: Option<Arc<dyn NotificationDispatcher>>,
    certificates: Option<Arc<dyn CertificateGenerator>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SignatureRequestManagerBuilder {
    pub fn new(store: Arc<dyn RequestStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            documents,
            config: None,
            authenticators: None,
            notifier: None,
            certificates: None,
            clock: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_authenticators(mut self, registry: AuthenticatorRegistry) -> Self {
        self.authenticators = Some(registry);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_certificate_generator(mut self, generator: Arc<dyn CertificateGenerator>) -> Self {
        self.certificates = Some(generator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the manager.
    ///
    /// Without an explicit registry, no authentication method is accepted.
    pub fn build(self) -> SignatureRequestManager {
        let config = self.config.unwrap_or_default();
        let authenticators = self
            .authenticators
            .unwrap_or_else(|| AuthenticatorRegistry::new(config.auth_timeout()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        SignatureRequestManager {
            audit: self.store.audit_recorder(),
            store: self.store,
            coordinator: SigningOrderCoordinator::new(),
            authenticators,
            documents: self.documents,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LoggingNotifier)),
            certificates: self.certificates,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_tx,
            config,
        }
    }
}
