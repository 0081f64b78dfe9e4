mod common;

use common::*;
use quizpay::application::payment::{ResultLoad, SubmitOutcome};
use quizpay::application::poller::PollOutcome;
use quizpay::domain::attempt::AttemptId;
use quizpay::domain::payment::{PaymentTarget, ProviderOutcome, RedirectStatus};
use quizpay::domain::session::UserId;
use quizpay::domain::storage::PENDING_PAYMENT_ATTEMPT_ID;
use quizpay::error::ClientError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn attempt(id: &str) -> PaymentTarget {
    PaymentTarget::Attempt(AttemptId::new(id).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_attempt_aborts_before_provider() {
    let backend = Arc::new(ScriptedBackend::new(&["A1"]));
    let (flow, storage) = build_flow(&backend);
    let provider = RecordingProvider::succeeding();

    let result = flow
        .pay(&attempt("missing"), &provider, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ClientError::NotFound(_))));
    assert_eq!(provider.calls(), 0);
    assert_eq!(backend.status_calls(), 0);
    assert_eq!(pending_marker(&storage).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_skips_sync_and_poll() {
    let backend = Arc::new(ScriptedBackend::new(&["A1"]).paid_on(1));
    let (flow, _) = build_flow(&backend);
    let provider = RecordingProvider::new(ProviderOutcome::Failed {
        message: "Your card was declined.".to_string(),
    });

    let result = flow
        .pay(&attempt("A1"), &provider, &CancellationToken::new())
        .await;
    settle().await;

    match result {
        Err(ClientError::ProviderError(message)) => {
            assert_eq!(message, "Your card was declined.");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert_eq!(backend.sync_calls(), 0);
    assert_eq!(backend.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_allows_manual_retry() {
    let backend = Arc::new(ScriptedBackend::new(&["A1"]).paid_on(1));
    let (flow, _) = build_flow(&backend);
    let declined = RecordingProvider::new(ProviderOutcome::Failed {
        message: "Your card was declined.".to_string(),
    });
    let cancel = CancellationToken::new();

    assert!(flow.pay(&attempt("A1"), &declined, &cancel).await.is_err());
    let retried = flow
        .pay(&attempt("A1"), &RecordingProvider::succeeding(), &cancel)
        .await
        .unwrap();

    assert!(matches!(retried, SubmitOutcome::Reconciled(_)));
    assert_eq!(backend.intent_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sync_does_not_affect_outcome() {
    let backend = Arc::new(
        ScriptedBackend::new(&["A1"])
            .paid_on(2)
            .with_failing_sync(),
    );
    let (flow, storage) = build_flow(&backend);

    let outcome = flow
        .pay(
            &attempt("A1"),
            &RecordingProvider::succeeding(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    settle().await;

    let SubmitOutcome::Reconciled(report) = outcome else {
        panic!("expected reconciliation, got {outcome:?}");
    };
    assert!(matches!(report.outcome, PollOutcome::Confirmed(_)));
    assert_eq!(backend.sync_calls(), 1);
    assert_eq!(pending_marker(&storage).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_requires_action_defers_to_resume() {
    let backend = Arc::new(ScriptedBackend::new(&["A1"]).paid_on(1));
    let (flow, storage) = build_flow(&backend);
    let provider = RecordingProvider::new(ProviderOutcome::RequiresAction);
    let cancel = CancellationToken::new();

    let outcome = flow.pay(&attempt("A1"), &provider, &cancel).await.unwrap();
    settle().await;

    assert_eq!(outcome, SubmitOutcome::AwaitingProvider);
    assert_eq!(backend.sync_calls(), 0);
    assert_eq!(backend.status_calls(), 0);
    assert_eq!(pending_marker(&storage).await.as_deref(), Some("A1"));

    let report = flow.resume(RedirectStatus::Succeeded, &cancel).await.unwrap();
    assert!(matches!(report.outcome, PollOutcome::Confirmed(_)));
    assert_eq!(pending_marker(&storage).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_resume_without_marker_fails() {
    let backend = Arc::new(ScriptedBackend::new(&[]));
    let (flow, _) = build_flow(&backend);

    let result = flow
        .resume(RedirectStatus::Succeeded, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ClientError::MissingPendingAttempt)));
    assert_eq!(backend.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_timeout_restarts_from_zero() {
    // Unpaid for the whole first budget, paid on the first check after.
    let backend = Arc::new(ScriptedBackend::new(&["A2"]).paid_on(16));
    let (flow, storage) = build_flow(&backend);
    let cancel = CancellationToken::new();

    let first = flow
        .pay(&attempt("A2"), &RecordingProvider::succeeding(), &cancel)
        .await
        .unwrap();
    assert!(matches!(
        first,
        SubmitOutcome::Reconciled(ref r) if matches!(r.outcome, PollOutcome::TimedOut { .. })
    ));

    let report = flow.resume(RedirectStatus::Succeeded, &cancel).await.unwrap();

    assert_eq!(report.ticks, 1);
    assert!(matches!(report.outcome, PollOutcome::Confirmed(_)));
    assert_eq!(pending_marker(&storage).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_resume_with_failed_redirect_is_provider_error() {
    let backend = Arc::new(ScriptedBackend::new(&["A1"]));
    let (flow, storage) = build_flow(&backend);
    storage.set(PENDING_PAYMENT_ATTEMPT_ID, &"A1").await.unwrap();

    let result = flow
        .resume(RedirectStatus::RequiresPaymentMethod, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ClientError::ProviderError(_))));
    assert_eq!(pending_marker(&storage).await.as_deref(), Some("A1"));
}

#[tokio::test(start_paused = true)]
async fn test_load_result_expecting_payment_polls_until_paid() {
    let backend = Arc::new(ScriptedBackend::new(&["A3"]).paid_on(3));
    let (flow, storage) = build_flow(&backend);
    let id = AttemptId::new("A3").unwrap();

    let loaded = flow
        .load_result(&id, true, &CancellationToken::new())
        .await
        .unwrap();

    let ResultLoad::Reconciled(report) = loaded else {
        panic!("expected reconciliation, got {loaded:?}");
    };
    assert!(matches!(report.outcome, PollOutcome::Confirmed(_)));
    // One load plus two polls.
    assert_eq!(backend.status_calls(), 3);
    assert_eq!(pending_marker(&storage).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_load_result_without_expectation_returns_locked_result() {
    let backend = Arc::new(ScriptedBackend::new(&["A3"]));
    let (flow, storage) = build_flow(&backend);
    let id = AttemptId::new("A3").unwrap();

    let loaded = flow
        .load_result(&id, false, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(loaded, ResultLoad::Ready(ref r) if !r.is_paid));
    assert_eq!(backend.status_calls(), 1);
    assert_eq!(pending_marker(&storage).await, None);
}

#[tokio::test]
async fn test_blank_upgrade_user_is_rejected() {
    let backend = Arc::new(ScriptedBackend::new(&[]));
    let (flow, _) = build_flow(&backend);

    let result = flow
        .initiate(&PaymentTarget::Upgrade(UserId(" ".to_string())))
        .await;

    assert!(matches!(result, Err(ClientError::ValidationError(_))));
    assert_eq!(backend.intent_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flush_sync_waits_for_notification() {
    let backend = Arc::new(ScriptedBackend::new(&["A1"]).paid_on(1));
    let (flow, _) = build_flow(&backend);

    flow.pay(
        &attempt("A1"),
        &RecordingProvider::succeeding(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(flow.flush_sync(Duration::from_secs(1)).await);
    assert_eq!(backend.sync_calls(), 1);
}
