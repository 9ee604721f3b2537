use std::time::Duration;

use practice_payments::domain::value_objects::{booking::BookingPolicy, no_show::NoShowPolicy};
use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub stripe: Stripe,
    pub notifications: Notifications,
    pub policies: PaymentPolicies,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for Stripe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stripe")
            .field("secret_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Notifications {
    /// `None` logs notifications instead of delivering them.
    pub webhook_url: Option<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PaymentPolicies {
    pub booking: BookingPolicy,
    pub no_show: NoShowPolicy,
    pub capture_lead_hours: i64,
}
