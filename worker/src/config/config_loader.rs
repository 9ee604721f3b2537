use std::time::Duration;

use anyhow::{Result, bail};
use backend::config::config_loader::{
    load_database, load_notifications, load_payment_policies, load_stripe, optional,
    optional_parsed, required,
};

use super::config_model::{DotEnvyConfig, Schedule, Triggers, WorkerServer};

const DEFAULT_NO_SHOW_SCAN_INTERVAL_SECS: u64 = 300;
const DEFAULT_CAPTURE_INTERVAL_SECS: u64 = 900;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: required("SERVER_PORT_WORKER")?.parse()?,
        body_limit: required("SERVER_BODY_LIMIT")?.parse()?,
        timeout: required("SERVER_TIMEOUT")?.parse()?,
    };

    Ok(DotEnvyConfig {
        worker_server,
        database: load_database()?,
        stripe: load_stripe()?,
        notifications: load_notifications()?,
        policies: load_payment_policies()?,
        schedule: load_schedule()?,
        triggers: Triggers {
            internal_token: optional("INTERNAL_TRIGGER_TOKEN"),
        },
    })
}

fn load_schedule() -> Result<Schedule> {
    let no_show_secs = optional_parsed(
        "NO_SHOW_SCAN_INTERVAL_SECS",
        DEFAULT_NO_SHOW_SCAN_INTERVAL_SECS,
    )?;
    let capture_secs = optional_parsed("CAPTURE_INTERVAL_SECS", DEFAULT_CAPTURE_INTERVAL_SECS)?;
    if no_show_secs == 0 || capture_secs == 0 {
        bail!("NO_SHOW_SCAN_INTERVAL_SECS and CAPTURE_INTERVAL_SECS must be greater than zero");
    }

    Ok(Schedule {
        no_show_scan_interval: Duration::from_secs(no_show_secs),
        capture_interval: Duration::from_secs(capture_secs),
    })
}
