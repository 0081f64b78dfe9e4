use crate::domain::ports::PaymentBackendRef;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Tells the backend about a provider-side success ahead of its webhook.
#[derive(Clone)]
pub struct SyncNotifier {
    backend: PaymentBackendRef,
    in_flight: TaskTracker,
}

impl SyncNotifier {
    pub fn new(backend: PaymentBackendRef) -> Self {
        Self {
            backend,
            in_flight: TaskTracker::new(),
        }
    }

    /// Fire and forget. Failures are logged and never reach the caller.
    pub fn notify(&self, payment_intent_id: &str) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let payment_intent_id = payment_intent_id.to_string();

        self.in_flight.spawn(async move {
            match backend.sync_payment(&payment_intent_id).await {
                Ok(()) => debug!(%payment_intent_id, "Payment sync acknowledged"),
                Err(e) => warn!(
                    %payment_intent_id,
                    error = %e,
                    "Payment sync failed, webhook will reconcile"
                ),
            }
        })
    }

    /// Waits up to `limit` for in-flight notifications. Returns `false` if some
    /// were still running when the limit passed; those keep running.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.in_flight.close();
        let drained = tokio::time::timeout(limit, self.in_flight.wait())
            .await
            .is_ok();
        self.in_flight.reopen();
        drained
    }
}
