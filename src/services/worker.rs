use {
    crate::domain::dispatch::{DeferredDispatch, HookName},
    crate::services::payment_methods::PaymentMethodService,
    crate::services::transactions::TransactionService,
    std::sync::Arc,
    tokio::sync::watch,
};

/// Drain due deferred jobs and re-enter the same processing entry points the
/// redirect path uses. A failed job is logged and dropped; webhook
/// re-delivery by the processor is the retry mechanism, not this loop.
pub async fn run_worker(
    dispatch: Arc<dyn DeferredDispatch>,
    transactions: Arc<TransactionService>,
    payment_methods: Arc<PaymentMethodService>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("deferred job worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("deferred job worker shutting down");
                return;
            }
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
        }

        let jobs = match dispatch.claim_due(10) {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "claiming deferred jobs failed");
                continue;
            }
        };

        for job in jobs {
            let result = match job.hook {
                HookName::ProcessTransaction => {
                    transactions.process(&job.event).await.map(|_| ())
                }
                HookName::SaveCard => payment_methods.process_scheduled(&job.event).await.map(|_| ()),
            };

            match result {
                Ok(()) => tracing::info!(job_id = %job.id, hook = %job.hook, "deferred job processed"),
                Err(e) => tracing::error!(
                    job_id = %job.id,
                    hook = %job.hook,
                    transaction_id = %job.event.transaction_id(),
                    error = %e,
                    "deferred job failed, relying on webhook re-delivery"
                ),
            }
        }
    }
}
