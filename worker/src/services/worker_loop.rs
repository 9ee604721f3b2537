use std::{future::Future, time::Duration};

use anyhow::Result;
use tracing::{error, info};

/// Runs `tick` every `interval` forever. A failed tick is logged and the loop keeps going.
pub async fn run_worker_loop<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(worker = name, interval_secs = interval.as_secs(), "worker loop started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(err) = tick().await {
            error!(worker = name, error = ?err, "worker loop: tick failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[tokio::test]
    async fn failed_ticks_do_not_stop_the_loop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let handle = tokio::spawn(run_worker_loop("test", Duration::from_millis(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("tick failed")
            }
        }));

        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }
}
