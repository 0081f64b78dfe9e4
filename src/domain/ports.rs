use super::attempt::{Answer, AttemptId, HistoryItem, Question, QuizResult};
use super::payment::{PaymentIntent, ProviderOutcome};
use super::session::{AuthResponse, Credentials, GoogleCredential, User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Local key-value persistence holding JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn create_intent(&self, attempt: &AttemptId) -> Result<PaymentIntent>;
    async fn create_premium_intent(&self, user: &UserId) -> Result<PaymentIntent>;
    async fn sync_payment(&self, payment_intent_id: &str) -> Result<()>;
}

#[async_trait]
pub trait QuizBackend: Send + Sync {
    async fn questions(&self) -> Result<Vec<Question>>;
    async fn submit(&self, answers: &[Answer]) -> Result<QuizResult>;
    async fn result(&self, attempt: &AttemptId) -> Result<QuizResult>;
    async fn history(&self) -> Result<Vec<HistoryItem>>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse>;
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse>;
    async fn google(&self, credential: &GoogleCredential) -> Result<AuthResponse>;
    async fn profile(&self) -> Result<User>;
    async fn delete_account(&self) -> Result<()>;
}

/// The provider's own card-collection step, driven by its UI component.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn confirm(&self, intent: &PaymentIntent) -> ProviderOutcome;
}

pub type KeyValueStoreRef = Arc<dyn KeyValueStore>;
pub type PaymentBackendRef = Arc<dyn PaymentBackend>;
pub type QuizBackendRef = Arc<dyn QuizBackend>;
pub type AuthBackendRef = Arc<dyn AuthBackend>;
