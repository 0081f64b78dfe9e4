use super::poller::{PollReport, ReconciliationPoller};
use super::sync::SyncNotifier;
use crate::domain::attempt::{AttemptId, QuizResult};
use crate::domain::payment::{PaymentIntent, PaymentTarget, ProviderOutcome, RedirectStatus};
use crate::domain::ports::{PaymentBackendRef, PaymentProvider, QuizBackendRef};
use crate::domain::storage::{PENDING_PAYMENT_ATTEMPT_ID, Storage};
use crate::error::{ClientError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The provider confirmed immediately and the backend was polled.
    Reconciled(PollReport),
    /// The provider needs an out-of-band step; resume when the user returns.
    AwaitingProvider,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultLoad {
    Ready(QuizResult),
    Reconciled(PollReport),
}

/// Drives one payment from intent creation to backend confirmation.
///
/// The provider's client-side success is never taken as proof of payment: the
/// flow only reports unlocked content once the backend says the target is paid.
#[derive(Clone)]
pub struct PaymentFlow {
    payments: PaymentBackendRef,
    quiz: QuizBackendRef,
    notifier: SyncNotifier,
    poller: ReconciliationPoller,
    storage: Storage,
}

impl PaymentFlow {
    pub fn new(
        payments: PaymentBackendRef,
        quiz: QuizBackendRef,
        poller: ReconciliationPoller,
        storage: Storage,
    ) -> Self {
        Self {
            notifier: SyncNotifier::new(payments.clone()),
            payments,
            quiz,
            poller,
            storage,
        }
    }

    pub fn poller(&self) -> &ReconciliationPoller {
        &self.poller
    }

    /// Gives sync notifications still in flight up to `limit` to land, for
    /// callers about to shut the runtime down.
    pub async fn flush_sync(&self, limit: Duration) -> bool {
        self.notifier.drain(limit).await
    }

    pub async fn pending_attempt(&self) -> Result<Option<AttemptId>> {
        self.storage.get(PENDING_PAYMENT_ATTEMPT_ID).await
    }

    /// Requests a client secret for the target.
    ///
    /// For attempts the id is remembered as the pending payment so the flow can
    /// be resumed after a redirect or a refresh.
    pub async fn initiate(&self, target: &PaymentTarget) -> Result<PaymentIntent> {
        let intent = match target {
            PaymentTarget::Attempt(attempt) => {
                let intent = self.payments.create_intent(attempt).await?;
                self.storage.set(PENDING_PAYMENT_ATTEMPT_ID, attempt).await?;
                intent
            }
            PaymentTarget::Upgrade(user) => {
                if user.0.trim().is_empty() {
                    return Err(ClientError::ValidationError(
                        "User id must not be empty".to_string(),
                    ));
                }
                self.payments.create_premium_intent(user).await?
            }
        };
        info!(%target, "Payment intent created");
        Ok(intent)
    }

    /// Acts on the provider's immediate outcome.
    pub async fn submit(
        &self,
        target: &PaymentTarget,
        outcome: ProviderOutcome,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome> {
        match outcome {
            ProviderOutcome::Succeeded { payment_intent_id } => {
                info!(%target, %payment_intent_id, "Provider confirmed payment");
                self.notifier.notify(&payment_intent_id);
                let report = self.poller.run(target, cancel).await;
                Ok(SubmitOutcome::Reconciled(report))
            }
            ProviderOutcome::Failed { message } => {
                warn!(%target, %message, "Provider rejected payment");
                Err(ClientError::ProviderError(message))
            }
            ProviderOutcome::RequiresAction => {
                info!(%target, "Provider requires further action");
                Ok(SubmitOutcome::AwaitingProvider)
            }
        }
    }

    /// Full flow: intent, provider confirmation, sync and reconciliation.
    pub async fn pay(
        &self,
        target: &PaymentTarget,
        provider: &dyn PaymentProvider,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome> {
        let intent = self.initiate(target).await?;
        let outcome = provider.confirm(&intent).await;
        self.submit(target, outcome, cancel).await
    }

    /// Picks up a payment when the user returns from the provider's redirect.
    pub async fn resume(
        &self,
        status: RedirectStatus,
        cancel: &CancellationToken,
    ) -> Result<PollReport> {
        if status == RedirectStatus::RequiresPaymentMethod {
            return Err(ClientError::ProviderError(
                "Payment was not completed, try another payment method".to_string(),
            ));
        }

        let attempt = self
            .pending_attempt()
            .await?
            .ok_or(ClientError::MissingPendingAttempt)?;
        info!(%attempt, ?status, "Resuming payment reconciliation");
        Ok(self
            .poller
            .run(&PaymentTarget::Attempt(attempt), cancel)
            .await)
    }

    /// Loads a result, polling when the caller was told payment just went
    /// through but the backend does not show it yet.
    pub async fn load_result(
        &self,
        attempt: &AttemptId,
        expect_payment: bool,
        cancel: &CancellationToken,
    ) -> Result<ResultLoad> {
        let result = self.quiz.result(attempt).await?;
        if !expect_payment || result.is_paid {
            return Ok(ResultLoad::Ready(result));
        }

        info!(%attempt, "Payment confirmed locally but not by backend, polling");
        self.storage.set(PENDING_PAYMENT_ATTEMPT_ID, attempt).await?;
        let report = self
            .poller
            .run(&PaymentTarget::Attempt(attempt.clone()), cancel)
            .await;
        Ok(ResultLoad::Reconciled(report))
    }
}
