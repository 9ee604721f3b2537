use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::usecases::payment_lifecycle::PaymentLifecycleUseCase;
use chrono::Duration as LeadTime;
use tracing::{info, warn};

use super::worker_loop::run_worker_loop;

pub async fn run(usecase: Arc<PaymentLifecycleUseCase>, lead_time: LeadTime, interval: Duration) -> Result<()> {
    run_worker_loop("capture_sweep", interval, move || {
        let usecase = Arc::clone(&usecase);
        async move { capture_once(&usecase, lead_time).await }
    })
    .await
}

pub async fn capture_once(usecase: &PaymentLifecycleUseCase, lead_time: LeadTime) -> Result<()> {
    let result = usecase.capture_due(lead_time).await?;
    if result.failed > 0 {
        warn!(
            captured = result.captured,
            failed = result.failed,
            "capture_loop: some captures failed"
        );
    } else if result.captured > 0 {
        info!(captured = result.captured, "capture_loop: sweep finished");
    }
    Ok(())
}
