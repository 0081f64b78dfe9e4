#![allow(dead_code)]

use async_trait::async_trait;
use quizpay::application::payment::PaymentFlow;
use quizpay::application::poller::ReconciliationPoller;
use quizpay::domain::attempt::{Answer, AttemptId, HistoryItem, Question, QuizResult};
use quizpay::domain::payment::{PaymentIntent, ProviderOutcome};
use quizpay::domain::ports::{AuthBackend, PaymentBackend, PaymentProvider, QuizBackend};
use quizpay::domain::reconciliation::PollPolicy;
use quizpay::domain::session::{AuthResponse, Credentials, GoogleCredential, User, UserId};
use quizpay::domain::storage::Storage;
use quizpay::error::{ClientError, Result};
use quizpay::infrastructure::in_memory::InMemoryStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the backend answers to one status check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check {
    Paid,
    NotPaid,
    Down,
}

/// Backend fake whose status checks follow a script; once the script runs out
/// every further check returns `fallback`.
pub struct ScriptedBackend {
    known_attempts: Vec<String>,
    script: Mutex<VecDeque<Check>>,
    fallback: Check,
    sync_fails: bool,
    pub intent_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(known_attempts: &[&str]) -> Self {
        Self {
            known_attempts: known_attempts.iter().map(|s| s.to_string()).collect(),
            script: Mutex::new(VecDeque::new()),
            fallback: Check::NotPaid,
            sync_fails: false,
            intent_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, checks: &[Check]) -> Self {
        *self.script.lock().unwrap() = checks.iter().copied().collect();
        self
    }

    pub fn paid_on(self, k: usize) -> Self {
        let mut checks = vec![Check::NotPaid; k - 1];
        checks.push(Check::Paid);
        Self {
            fallback: Check::Paid,
            ..self.with_script(&checks)
        }
    }

    pub fn with_failing_sync(self) -> Self {
        Self {
            sync_fails: true,
            ..self
        }
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn intent_calls(&self) -> usize {
        self.intent_calls.load(Ordering::SeqCst)
    }

    fn next_check(&self) -> Check {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }

    fn intent() -> PaymentIntent {
        PaymentIntent {
            client_secret: "pi_test_secret_abc".to_string(),
            public_key: "pk_test".to_string(),
        }
    }
}

pub fn user(is_premium: bool) -> User {
    User {
        id: UserId("u1".to_string()),
        email: "ana@example.com".to_string(),
        name: "Ana".to_string(),
        is_premium,
    }
}

#[async_trait]
impl PaymentBackend for ScriptedBackend {
    async fn create_intent(&self, attempt: &AttemptId) -> Result<PaymentIntent> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        if self.known_attempts.iter().any(|a| a == attempt.as_str()) {
            Ok(Self::intent())
        } else {
            Err(ClientError::NotFound(format!("/payment/create-intent ({attempt})")))
        }
    }

    async fn create_premium_intent(&self, _user: &UserId) -> Result<PaymentIntent> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::intent())
    }

    async fn sync_payment(&self, _payment_intent_id: &str) -> Result<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if self.sync_fails {
            Err(ClientError::BackendError {
                status: 500,
                message: "sync unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QuizBackend for ScriptedBackend {
    async fn questions(&self) -> Result<Vec<Question>> {
        Ok(Vec::new())
    }

    async fn submit(&self, _answers: &[Answer]) -> Result<QuizResult> {
        Ok(QuizResult::default())
    }

    async fn result(&self, attempt: &AttemptId) -> Result<QuizResult> {
        match self.next_check() {
            Check::Down => Err(ClientError::BackendError {
                status: 503,
                message: "unavailable".to_string(),
            }),
            check => {
                let is_paid = check == Check::Paid;
                Ok(QuizResult {
                    id: Some(attempt.to_string()),
                    is_paid,
                    result: is_paid
                        .then(|| serde_json::json!({ "dominant": { "titulo": "El Sabio" } })),
                    ..Default::default()
                })
            }
        }
    }

    async fn history(&self) -> Result<Vec<HistoryItem>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn register(&self, _: &Credentials) -> Result<AuthResponse> {
        Err(ClientError::Unauthorized)
    }

    async fn login(&self, _: &Credentials) -> Result<AuthResponse> {
        Err(ClientError::Unauthorized)
    }

    async fn google(&self, _: &GoogleCredential) -> Result<AuthResponse> {
        Err(ClientError::Unauthorized)
    }

    async fn profile(&self) -> Result<User> {
        match self.next_check() {
            Check::Down => Err(ClientError::BackendError {
                status: 503,
                message: "unavailable".to_string(),
            }),
            check => Ok(user(check == Check::Paid)),
        }
    }

    async fn delete_account(&self) -> Result<()> {
        Ok(())
    }
}

/// Provider fake returning a fixed outcome and counting invocations.
pub struct RecordingProvider {
    outcome: ProviderOutcome,
    pub calls: AtomicUsize,
}

impl RecordingProvider {
    pub fn new(outcome: ProviderOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(ProviderOutcome::Succeeded {
            payment_intent_id: "pi_test".to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for RecordingProvider {
    async fn confirm(&self, _intent: &PaymentIntent) -> ProviderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub fn build_flow(backend: &Arc<ScriptedBackend>) -> (PaymentFlow, Storage) {
    build_flow_with(backend, PollPolicy::default())
}

pub fn build_flow_with(
    backend: &Arc<ScriptedBackend>,
    policy: PollPolicy,
) -> (PaymentFlow, Storage) {
    let storage = Storage::new(Arc::new(InMemoryStore::new()));
    let poller = ReconciliationPoller::new(
        backend.clone(),
        backend.clone(),
        storage.clone(),
        policy,
    );
    let flow = PaymentFlow::new(backend.clone(), backend.clone(), poller, storage.clone());
    (flow, storage)
}

pub async fn pending_marker(storage: &Storage) -> Option<String> {
    storage
        .get::<String>(quizpay::domain::storage::PENDING_PAYMENT_ATTEMPT_ID)
        .await
        .unwrap()
}

/// Lets spawned fire-and-forget tasks run under a paused clock.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}
