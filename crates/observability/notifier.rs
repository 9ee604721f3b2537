use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

const QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) reconciliation: bool,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_chain: Vec<String>,
}

#[async_trait]
pub(crate) trait AlertProvider: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Bounded queue in front of the alert providers. Sending never blocks the caller.
#[derive(Clone)]
pub(crate) struct AlertNotifier {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertNotifier {
    pub(crate) fn new(providers: Vec<Arc<dyn AlertProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for provider in &providers {
                    // eprintln: a tracing call here would feed back into the alert layer.
                    if let Err(err) = provider.send(&event).await {
                        eprintln!(
                            "observability: alert provider {} failed: {err}",
                            provider.provider_name()
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                eprintln!(
                    "observability: alert queue full; dropping event from {}",
                    dropped.target
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("observability: alert queue closed; dropping event");
            }
        }
    }
}
