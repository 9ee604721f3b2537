use std::{env, time::Duration};

use anyhow::{Context, Result, bail};
use practice_payments::domain::value_objects::{
    booking::BookingPolicy,
    no_show::{DEFAULT_FEE_AMOUNT, DEFAULT_WINDOW_MINUTES, MAX_WINDOW_MINUTES, NoShowPolicy},
};
use url::Url;

use super::config_model::{
    BackendServer, Database, DotEnvyConfig, Notifications, PaymentPolicies, Stripe, Supabase,
};
use crate::usecases::payment_lifecycle::{DEFAULT_CAPTURE_LEAD_HOURS, MAX_CAPTURE_LEAD_HOURS};

const DEFAULT_STRIPE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_POOL_SIZE: u32 = 10;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?.parse()?,
        body_limit: required("SERVER_BODY_LIMIT")?.parse()?,
        timeout: required("SERVER_TIMEOUT")?.parse()?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database: load_database()?,
        supabase,
        stripe: load_stripe()?,
        notifications: load_notifications()?,
        policies: load_payment_policies()?,
    })
}

pub fn load_database() -> Result<Database> {
    Ok(Database {
        url: required("DATABASE_URL")?,
        max_pool_size: optional_parsed("DATABASE_MAX_POOL_SIZE", DEFAULT_MAX_POOL_SIZE)?,
    })
}

pub fn load_stripe() -> Result<Stripe> {
    let timeout_secs = optional_parsed("STRIPE_TIMEOUT_SECS", DEFAULT_STRIPE_TIMEOUT_SECS)?;
    if timeout_secs == 0 {
        bail!("STRIPE_TIMEOUT_SECS must be greater than zero");
    }

    Ok(Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        timeout: Duration::from_secs(timeout_secs),
    })
}

pub fn load_notifications() -> Result<Notifications> {
    let webhook_url = match optional("NOTIFICATION_WEBHOOK_URL") {
        Some(raw) => Some(Url::parse(&raw).context("NOTIFICATION_WEBHOOK_URL is invalid")?),
        None => None,
    };

    Ok(Notifications {
        webhook_url,
        timeout: Duration::from_secs(optional_parsed(
            "NOTIFICATION_TIMEOUT_SECS",
            DEFAULT_NOTIFICATION_TIMEOUT_SECS,
        )?),
    })
}

pub fn load_payment_policies() -> Result<PaymentPolicies> {
    let booking = match optional("BOOKING_POLICY") {
        Some(raw) => BookingPolicy::from_str(&raw)
            .with_context(|| format!("BOOKING_POLICY is invalid (value: {raw})"))?,
        None => BookingPolicy::default(),
    };

    let no_show = NoShowPolicy {
        window_minutes: optional_parsed("NO_SHOW_WINDOW_MINUTES", DEFAULT_WINDOW_MINUTES)?,
        fee_amount: optional_parsed("NO_SHOW_FEE_AMOUNT", DEFAULT_FEE_AMOUNT)?,
        auto_process: optional_parsed("NO_SHOW_AUTO_PROCESS", true)?,
    };

    let policies = PaymentPolicies {
        booking,
        no_show,
        capture_lead_hours: optional_parsed("CAPTURE_LEAD_HOURS", DEFAULT_CAPTURE_LEAD_HOURS)?,
    };
    check_policy_ranges(&policies)?;
    Ok(policies)
}

fn check_policy_ranges(policies: &PaymentPolicies) -> Result<()> {
    if !policies.no_show.window_in_range() {
        bail!(
            "NO_SHOW_WINDOW_MINUTES must be between 0 and {MAX_WINDOW_MINUTES} (value: {})",
            policies.no_show.window_minutes
        );
    }
    if !(0..=MAX_CAPTURE_LEAD_HOURS).contains(&policies.capture_lead_hours) {
        bail!(
            "CAPTURE_LEAD_HOURS must be between 0 and {MAX_CAPTURE_LEAD_HOURS} (value: {})",
            policies.capture_lead_hours
        );
    }
    Ok(())
}

pub fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} is invalid"))
}

pub fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn optional_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} is invalid (value: {raw})")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_fall_back_to_defaults() {
        assert_eq!(
            optional_parsed("PRACTICE_TEST_UNSET_LEAD_HOURS", 24_i64).unwrap(),
            24
        );
    }

    #[test]
    fn malformed_optional_values_are_errors() {
        unsafe {
            env::set_var("PRACTICE_TEST_MALFORMED_WINDOW", "fifteen");
        }
        let result = optional_parsed("PRACTICE_TEST_MALFORMED_WINDOW", 15_i64);
        assert!(result.is_err());
    }

    fn policies(window_minutes: i64, capture_lead_hours: i64) -> PaymentPolicies {
        PaymentPolicies {
            booking: BookingPolicy::default(),
            no_show: NoShowPolicy {
                window_minutes,
                ..NoShowPolicy::default()
            },
            capture_lead_hours,
        }
    }

    #[test]
    fn policy_ranges_accept_defaults_and_bounds() {
        let defaults = policies(DEFAULT_WINDOW_MINUTES, DEFAULT_CAPTURE_LEAD_HOURS);
        assert!(check_policy_ranges(&defaults).is_ok());
        let bounds = policies(MAX_WINDOW_MINUTES, MAX_CAPTURE_LEAD_HOURS);
        assert!(check_policy_ranges(&bounds).is_ok());
        assert!(check_policy_ranges(&policies(0, 0)).is_ok());
    }

    #[test]
    fn policy_ranges_reject_values_that_overflow_durations() {
        let err = check_policy_ranges(&policies(i64::MAX, DEFAULT_CAPTURE_LEAD_HOURS)).unwrap_err();
        assert!(err.to_string().contains("NO_SHOW_WINDOW_MINUTES"));

        let err = check_policy_ranges(&policies(DEFAULT_WINDOW_MINUTES, i64::MAX)).unwrap_err();
        assert!(err.to_string().contains("CAPTURE_LEAD_HOURS"));

        assert!(check_policy_ranges(&policies(-1, DEFAULT_CAPTURE_LEAD_HOURS)).is_err());
        assert!(check_policy_ranges(&policies(DEFAULT_WINDOW_MINUTES, -1)).is_err());
    }
}
