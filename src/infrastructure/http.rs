use crate::domain::attempt::{Answer, AttemptId, HistoryItem, Question, QuizResult};
use crate::domain::payment::PaymentIntent;
use crate::domain::ports::{AuthBackend, PaymentBackend, QuizBackend};
use crate::domain::session::{
    AuthEvent, AuthEvents, AuthResponse, Credentials, GoogleCredential, User, UserId,
};
use crate::domain::storage::{AUTH_TOKEN, Storage};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `GET /user/profile` answers either with the user or with `{ "user": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    Wrapped { user: User },
    Bare(User),
}

impl From<ProfileResponse> for User {
    fn from(response: ProfileResponse) -> Self {
        match response {
            ProfileResponse::Wrapped { user } | ProfileResponse::Bare(user) => user,
        }
    }
}

/// Backend adapter speaking the quiz API over HTTP.
///
/// Every request carries the stored auth token as a bearer token. A 401 from
/// any endpoint publishes [`AuthEvent::SessionExpired`] before the error is
/// returned to the caller.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    storage: Storage,
    events: AuthEvents,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, storage: Storage, events: AuthEvents) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = Url::parse(&base_url.into())
            .map_err(|e| ClientError::ValidationError(format!("Invalid API URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ValidationError(format!(
                "Invalid API URL: {base_url}"
            )));
        }
        Ok(Self {
            client,
            base_url,
            storage,
            events,
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::ValidationError(format!("Invalid API URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        debug!(%method, %url, "backend request");

        let mut request = self.client.request(method, url);
        if let Some(token) = self.storage.get::<String>(AUTH_TOKEN).await? {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("Session expired or invalid token (401)");
                self.events.publish(AuthEvent::SessionExpired);
                Err(ClientError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(response.url().path().to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or(body);
                Err(ClientError::BackendError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.execute(request).await?.json::<T>().await?)
    }
}

#[async_trait]
impl PaymentBackend for HttpBackend {
    async fn create_intent(&self, attempt: &AttemptId) -> Result<PaymentIntent> {
        let request = self
            .request(Method::POST, &["payment", "create-intent"])
            .await?
            .json(&json!({ "attemptId": attempt }));
        self.fetch(request).await
    }

    async fn create_premium_intent(&self, user: &UserId) -> Result<PaymentIntent> {
        let request = self
            .request(Method::POST, &["payment", "create-premium-intent"])
            .await?
            .json(&json!({ "userId": user }));
        self.fetch(request).await
    }

    async fn sync_payment(&self, payment_intent_id: &str) -> Result<()> {
        let request = self
            .request(Method::POST, &["payment", "sync"])
            .await?
            .json(&json!({ "paymentIntentId": payment_intent_id }));
        self.execute(request).await?;
        Ok(())
    }
}

#[async_trait]
impl QuizBackend for HttpBackend {
    async fn questions(&self) -> Result<Vec<Question>> {
        let request = self.request(Method::GET, &["questions"]).await?;
        self.fetch(request).await
    }

    async fn submit(&self, answers: &[Answer]) -> Result<QuizResult> {
        let request = self
            .request(Method::POST, &["quiz", "submit"])
            .await?
            .json(&json!({ "answers": answers }));
        self.fetch(request).await
    }

    async fn result(&self, attempt: &AttemptId) -> Result<QuizResult> {
        let request = self
            .request(Method::GET, &["quiz", "result", attempt.as_str()])
            .await?;
        self.fetch(request).await
    }

    async fn history(&self) -> Result<Vec<HistoryItem>> {
        let request = self.request(Method::GET, &["quiz", "history"]).await?;
        self.fetch(request).await
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let request = self
            .request(Method::POST, &["auth", "register"])
            .await?
            .json(credentials);
        self.fetch(request).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let request = self
            .request(Method::POST, &["auth", "login"])
            .await?
            .json(credentials);
        self.fetch(request).await
    }

    async fn google(&self, credential: &GoogleCredential) -> Result<AuthResponse> {
        let request = match credential {
            GoogleCredential::IdToken(token) => self
                .request(Method::POST, &["auth", "google"])
                .await?
                .json(&json!({ "token": token })),
            GoogleCredential::AccessToken(token) => self
                .request(Method::POST, &["auth", "google-web"])
                .await?
                .json(&json!({ "accessToken": token })),
        };
        self.fetch(request).await
    }

    async fn profile(&self) -> Result<User> {
        let request = self.request(Method::GET, &["user", "profile"]).await?;
        let response: ProfileResponse = self.fetch(request).await?;
        Ok(response.into())
    }

    async fn delete_account(&self) -> Result<()> {
        let request = self.request(Method::DELETE, &["user", "me"]).await?;
        self.execute(request).await?;
        Ok(())
    }
}
