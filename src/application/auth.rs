use crate::domain::ports::AuthBackendRef;
use crate::domain::session::{
    Access, AuthEvent, AuthEvents, AuthResponse, Credentials, GoogleCredential, GuardDecision,
    User,
};
use crate::domain::storage::{
    AUTH_TOKEN, CURRENT_ANSWERS, CURRENT_QUESTION_INDEX, Storage, USER_INFO,
};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns the locally cached session: token, user, and the auth event stream.
pub struct AuthService {
    backend: AuthBackendRef,
    storage: Storage,
    events: AuthEvents,
}

impl AuthService {
    pub fn new(backend: AuthBackendRef, storage: Storage, events: AuthEvents) -> Self {
        Self {
            backend,
            storage,
            events,
        }
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<User> {
        let response = self.backend.register(credentials).await?;
        self.save_session(response).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        let response = self.backend.login(credentials).await?;
        self.save_session(response).await
    }

    pub async fn login_google(&self, credential: &GoogleCredential) -> Result<User> {
        let response = self.backend.google(credential).await?;
        self.save_session(response).await
    }

    async fn save_session(&self, response: AuthResponse) -> Result<User> {
        self.storage.set(AUTH_TOKEN, &response.token).await?;
        self.storage.set(USER_INFO, &response.user).await?;
        info!(user = %response.user.id, "Signed in");
        self.events.publish(AuthEvent::SignedIn(response.user.clone()));
        Ok(response.user)
    }

    /// Wipes local storage. With `preserve_quiz`, in-progress answers and the
    /// question index survive so an anonymous quiz can continue.
    pub async fn logout(&self, preserve_quiz: bool) -> Result<()> {
        let mut saved_answers = None;
        let mut saved_index = None;
        if preserve_quiz {
            saved_answers = self.storage.get::<serde_json::Value>(CURRENT_ANSWERS).await?;
            saved_index = self
                .storage
                .get::<serde_json::Value>(CURRENT_QUESTION_INDEX)
                .await?;
        }

        self.storage.clear().await?;

        if let Some(answers) = saved_answers {
            self.storage.set(CURRENT_ANSWERS, &answers).await?;
            if let Some(index) = saved_index {
                self.storage.set(CURRENT_QUESTION_INDEX, &index).await?;
            }
        }

        info!(preserve_quiz, "Signed out");
        self.events.publish(AuthEvent::SignedOut);
        Ok(())
    }

    pub async fn is_logged_in(&self) -> Result<bool> {
        Ok(self
            .storage
            .get::<String>(AUTH_TOKEN)
            .await?
            .is_some_and(|token| !token.is_empty()))
    }

    pub async fn check_access(&self, access: Access) -> Result<GuardDecision> {
        Ok(access.decide(self.is_logged_in().await?))
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        self.storage.get(USER_INFO).await
    }

    /// Fetches the profile and refreshes the cached user.
    pub async fn refresh_profile(&self) -> Result<User> {
        let user = self.backend.profile().await?;
        self.storage.set(USER_INFO, &user).await?;
        Ok(user)
    }

    pub async fn delete_account(&self) -> Result<()> {
        self.backend.delete_account().await?;
        self.logout(false).await
    }

    /// Signs out whenever the backend reports the session expired.
    pub fn spawn_expiry_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut events = service.events.subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SessionExpired) => {
                        if let Err(e) = service.logout(false).await {
                            warn!(error = %e, "Failed to clear expired session");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
