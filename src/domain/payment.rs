use super::attempt::AttemptId;
use super::session::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider-issued secret and publishable key for one charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub public_key: String,
}

/// What a payment unlocks: a single attempt's full result, or a premium upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTarget {
    Attempt(AttemptId),
    Upgrade(UserId),
}

impl fmt::Display for PaymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentTarget::Attempt(id) => write!(f, "attempt {id}"),
            PaymentTarget::Upgrade(id) => write!(f, "upgrade for user {id}"),
        }
    }
}

/// Immediate result reported by the payment provider after collecting details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Succeeded { payment_intent_id: String },
    Failed { message: String },
    /// Redirect or other out-of-band step; the flow resumes on return.
    RequiresAction,
}

/// The `redirect_status` query parameter the provider appends on return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
}

impl FromStr for RedirectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "processing" => Ok(Self::Processing),
            "requires_payment_method" => Ok(Self::RequiresPaymentMethod),
            other => Err(format!("unknown redirect status: {other}")),
        }
    }
}
