use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::usecases::no_show::NoShowUseCase;
use practice_payments::domain::value_objects::no_show::NoShowPolicy;
use tracing::info;

use super::worker_loop::run_worker_loop;

pub async fn run(usecase: Arc<NoShowUseCase>, policy: NoShowPolicy, interval: Duration) -> Result<()> {
    run_worker_loop("no_show_scan", interval, move || {
        let usecase = Arc::clone(&usecase);
        async move { scan_once(&usecase, policy).await }
    })
    .await
}

pub async fn scan_once(usecase: &NoShowUseCase, policy: NoShowPolicy) -> Result<()> {
    let result = usecase.scan_and_process(policy).await?;
    if result.scanned > 0 {
        info!(
            scanned = result.scanned,
            processed = result.processed_count,
            skipped = result.skipped,
            failed = result.failed,
            "no_show_loop: scan finished"
        );
    }
    Ok(())
}
