//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use signing_engine::{
    AuthProof, AuthenticatorRegistry, CollaboratorError, CreateSignatureRequest,
    DigestCertificateGenerator, EngineConfig, InMemoryDocumentStore, InMemoryRequestStore,
    ManualClock, Notification, NotificationDispatcher, RequestStore, SharedSecretChannel,
    SignatureRequestManager,
};
use signing_types::{DocumentRef, SignatureType, SignerSpec, SigningOrder};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOCUMENT: &str = "proposal-42";
pub const CODE: &str = "424242";

/// Records every notification; optionally fails each delivery
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, recipient: &str) -> Vec<&'static str> {
        self.sent()
            .iter()
            .filter(|n| n.recipient() == recipient)
            .map(|n| n.kind())
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), CollaboratorError> {
        self.sent.lock().unwrap().push(notification);
        if self.fail {
            return Err(CollaboratorError::Unavailable("smtp relay down".into()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub manager: Arc<SignatureRequestManager>,
    pub store: Arc<InMemoryRequestStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub documents: Arc<InMemoryDocumentStore>,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default(), RecordingNotifier::default())
}

pub fn harness_with(config: EngineConfig, notifier: RecordingNotifier) -> Harness {
    let store = Arc::new(InMemoryRequestStore::new());
    build(config, notifier, store.clone(), store)
}

pub fn build(
    config: EngineConfig,
    notifier: RecordingNotifier,
    store: Arc<InMemoryRequestStore>,
    backend: Arc<dyn RequestStore>,
) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let notifier = Arc::new(notifier);
    let documents = Arc::new(InMemoryDocumentStore::new());
    documents.put(DocumentRef::new(DOCUMENT), b"Statement of work v3".to_vec());

    let authenticators = AuthenticatorRegistry::with_channel(
        Arc::new(SharedSecretChannel::new(CODE)),
        Duration::from_millis(config.auth_timeout_ms),
    );

    let manager = SignatureRequestManager::builder(backend, documents.clone())
        .with_config(config)
        .with_authenticators(authenticators)
        .with_notifier(notifier.clone())
        .with_certificate_generator(Arc::new(DigestCertificateGenerator))
        .with_clock(clock.clone())
        .build();

    Harness {
        manager: Arc::new(manager),
        store,
        clock,
        notifier,
        documents,
    }
}

pub fn proof() -> AuthProof {
    AuthProof::new(CODE)
}

pub fn request(order: SigningOrder, emails: &[&str]) -> CreateSignatureRequest {
    let signers = emails
        .iter()
        .map(|email| SignerSpec::new(*email, email.split('@').next().unwrap_or("signer")))
        .collect();
    CreateSignatureRequest::new(DOCUMENT, SignatureType::Advanced, order, signers)
}
