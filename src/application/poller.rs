use crate::domain::attempt::QuizResult;
use crate::domain::payment::PaymentTarget;
use crate::domain::ports::{AuthBackendRef, QuizBackendRef};
use crate::domain::reconciliation::{Observation, PollPolicy, ReconciliationState};
use crate::domain::session::User;
use crate::domain::storage::{PENDING_PAYMENT_ATTEMPT_ID, Storage};
use crate::error::{ClientError, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The backend record whose paid flag is being watched.
#[derive(Debug, Clone, PartialEq)]
pub enum PaidSnapshot {
    Attempt(QuizResult),
    Account(User),
}

impl PaidSnapshot {
    pub fn is_paid(&self) -> bool {
        match self {
            PaidSnapshot::Attempt(result) => result.is_paid,
            PaidSnapshot::Account(user) => user.is_premium,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Confirmed(PaidSnapshot),
    /// Budget exhausted. The pending marker is kept so a refresh can resume.
    TimedOut { last_seen: Option<PaidSnapshot> },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    /// Backend status checks performed.
    pub ticks: u32,
    /// Every state visited, starting with `Polling(0)`.
    pub states: Vec<ReconciliationState>,
    pub last_error: Option<String>,
}

/// Asks the backend whether a payment has been recorded until it has, or the
/// poll budget runs out.
#[derive(Clone)]
pub struct ReconciliationPoller {
    quiz: QuizBackendRef,
    auth: AuthBackendRef,
    storage: Storage,
    policy: PollPolicy,
}

impl ReconciliationPoller {
    pub fn new(
        quiz: QuizBackendRef,
        auth: AuthBackendRef,
        storage: Storage,
        policy: PollPolicy,
    ) -> Self {
        Self {
            quiz,
            auth,
            storage,
            policy,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    async fn check(&self, target: &PaymentTarget) -> Result<PaidSnapshot> {
        match target {
            PaymentTarget::Attempt(id) => Ok(PaidSnapshot::Attempt(self.quiz.result(id).await?)),
            PaymentTarget::Upgrade(_) => Ok(PaidSnapshot::Account(self.auth.profile().await?)),
        }
    }

    /// Polls until a terminal state is reached or `cancel` fires.
    ///
    /// Cancellation is observed both while a check is in flight and while
    /// waiting for the next tick. The pending marker is only removed on
    /// `Confirmed`.
    pub async fn run(&self, target: &PaymentTarget, cancel: &CancellationToken) -> PollReport {
        let mut state = ReconciliationState::start();
        let mut report = PollReport {
            outcome: PollOutcome::Cancelled,
            ticks: 0,
            states: vec![state],
            last_error: None,
        };
        let mut last_seen = None;

        loop {
            let checked = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                checked = self.check(target) => Some(checked),
            };
            let Some(checked) = checked else {
                info!(%target, ticks = report.ticks, "Reconciliation cancelled");
                return report;
            };
            report.ticks += 1;

            let observation = match checked {
                Ok(snapshot) if snapshot.is_paid() => {
                    state = state.advance(Observation::Paid, &self.policy);
                    report.states.push(state);
                    self.clear_marker(target).await;
                    info!(%target, ticks = report.ticks, "Payment confirmed by backend");
                    report.outcome = PollOutcome::Confirmed(snapshot);
                    return report;
                }
                Ok(snapshot) => {
                    last_seen = Some(snapshot);
                    Observation::NotPaid
                }
                Err(e) => {
                    warn!(%target, error = %e, "Error polling payment status");
                    report.last_error = Some(e.to_string());
                    Observation::Unreachable
                }
            };

            state = state.advance(observation, &self.policy);
            report.states.push(state);
            debug!(%target, ?state, "Payment not confirmed yet");

            if state == ReconciliationState::TimedOut {
                info!(%target, ticks = report.ticks, "Payment still processing, giving up for now");
                report.outcome = PollOutcome::TimedOut { last_seen };
                return report;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(%target, ticks = report.ticks, "Reconciliation cancelled");
                    return report;
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }
    }

    /// Runs the poll on its own task. Dropping the returned handle cancels it.
    pub fn spawn(&self, target: PaymentTarget) -> PollTask {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let poller = self.clone();
        let handle = tokio::spawn(async move { poller.run(&target, &token).await });
        PollTask { handle, cancel }
    }

    async fn clear_marker(&self, target: &PaymentTarget) {
        if let PaymentTarget::Attempt(_) = target
            && let Err(e) = self.storage.remove(PENDING_PAYMENT_ATTEMPT_ID).await
        {
            warn!(error = %e, "Failed to clear pending payment marker");
        }
    }
}

/// A poll bound to the lifetime of its owner.
pub struct PollTask {
    handle: JoinHandle<PollReport>,
    cancel: CancellationToken,
}

impl PollTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(mut self) -> Result<PollReport> {
        (&mut self.handle)
            .await
            .map_err(|e| ClientError::InternalError(Box::new(e)))
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
