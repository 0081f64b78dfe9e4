use super::ports::KeyValueStoreRef;
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const AUTH_TOKEN: &str = "auth_token";
pub const USER_INFO: &str = "user_info";
pub const CURRENT_ANSWERS: &str = "currentAnswers";
pub const CURRENT_QUESTION_INDEX: &str = "currentQuestionIndex";
pub const PENDING_PAYMENT_ATTEMPT_ID: &str = "pending_payment_attempt_id";

/// Typed access over a [`KeyValueStore`](super::ports::KeyValueStore).
#[derive(Clone)]
pub struct Storage {
    inner: KeyValueStoreRef,
}

impl Storage {
    pub fn new(inner: KeyValueStoreRef) -> Self {
        Self { inner }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.inner.set(key, serde_json::to_value(value)?).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}
