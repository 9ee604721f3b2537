use std::time::Duration;

use backend::config::config_model::{Database, Notifications, PaymentPolicies, Stripe};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub stripe: Stripe,
    pub notifications: Notifications,
    pub policies: PaymentPolicies,
    pub schedule: Schedule,
    pub triggers: Triggers,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub no_show_scan_interval: Duration,
    pub capture_interval: Duration,
}

#[derive(Clone)]
pub struct Triggers {
    /// Internal trigger routes answer 503 while unset.
    pub internal_token: Option<String>,
}

impl std::fmt::Debug for Triggers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triggers")
            .field(
                "internal_token",
                &self.internal_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
