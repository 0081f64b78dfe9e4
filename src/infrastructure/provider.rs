use crate::domain::payment::{PaymentIntent, ProviderOutcome};
use crate::domain::ports::PaymentProvider;
use async_trait::async_trait;

/// Extracts the payment intent id from a Stripe client secret
/// (`pi_123_secret_abc` → `pi_123`).
pub fn payment_intent_id_from_secret(client_secret: &str) -> Option<&str> {
    client_secret
        .split_once("_secret_")
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty())
}

/// Provider whose outcome was reported from outside the process, e.g. by the
/// card form that ran in the provider's own UI.
pub struct ReportedProvider {
    outcome: ProviderOutcome,
}

impl ReportedProvider {
    pub fn new(outcome: ProviderOutcome) -> Self {
        Self { outcome }
    }
}

#[async_trait]
impl PaymentProvider for ReportedProvider {
    async fn confirm(&self, intent: &PaymentIntent) -> ProviderOutcome {
        match &self.outcome {
            ProviderOutcome::Succeeded { payment_intent_id } if payment_intent_id.is_empty() => {
                match payment_intent_id_from_secret(&intent.client_secret) {
                    Some(id) => ProviderOutcome::Succeeded {
                        payment_intent_id: id.to_string(),
                    },
                    None => ProviderOutcome::Failed {
                        message: "Could not determine the payment intent id".to_string(),
                    },
                }
            }
            outcome => outcome.clone(),
        }
    }
}
