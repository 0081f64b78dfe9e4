use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "isPremium", default)]
    pub is_premium: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Token obtained from Google, depending on the platform that performed sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleCredential {
    /// Native sign-in yields an id token.
    IdToken(String),
    /// Web sign-in yields an access token the backend resolves itself.
    AccessToken(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
    /// The backend rejected the stored token.
    SessionExpired,
}

/// Broadcast channel carrying auth-state changes to whoever subscribes.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    /// Publishing without subscribers is not an error.
    pub fn publish(&self, event: AuthEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    RequiresAuth,
    GuestOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

impl Access {
    /// Decides access from the presence of a cached token alone.
    pub fn decide(self, has_token: bool) -> GuardDecision {
        match (self, has_token) {
            (Access::RequiresAuth, true) | (Access::GuestOnly, false) => GuardDecision::Allow,
            (Access::RequiresAuth, false) => GuardDecision::Redirect("/home"),
            (Access::GuestOnly, true) => GuardDecision::Redirect("/dashboard"),
        }
    }
}
