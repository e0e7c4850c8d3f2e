use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::reconciliation_runner::ReconciliationRunner;

/// Periodically resume reconciliation runs abandoned by a previous process.
///
/// The first tick fires immediately, so runs interrupted by a restart resume at boot.
pub async fn run_recovery_loop(runner: Arc<ReconciliationRunner>, every: Duration) {
    let mut ticker = interval(every);

    info!(
        "Reconciliation recovery started (checking every {}s)",
        every.as_secs()
    );

    loop {
        ticker.tick().await;

        match runner.recover_stale().await {
            Ok(resumed) if resumed.is_empty() => {}
            Ok(resumed) => info!(count = resumed.len(), "Resumed stale reconciliation runs"),
            Err(e) => error!(error = %e, "Failed to claim stale reconciliation runs"),
        }
    }
}
