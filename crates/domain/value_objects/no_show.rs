use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::appointments::AppointmentEntity,
    value_objects::enums::appointment_statuses::AppointmentStatus,
};

pub const DEFAULT_WINDOW_MINUTES: i64 = 15;
pub const DEFAULT_FEE_AMOUNT: f64 = 50.0;
/// One week.
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NoShowPolicy {
    /// Grace period after `scheduled_at` before the appointment counts as missed.
    pub window_minutes: i64,
    /// Fee in major units (dollars).
    pub fee_amount: f64,
    /// Charge the fee automatically, or only flag the appointment.
    pub auto_process: bool,
}

impl Default for NoShowPolicy {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            fee_amount: DEFAULT_FEE_AMOUNT,
            auto_process: true,
        }
    }
}

impl NoShowPolicy {
    pub fn window_in_range(&self) -> bool {
        (0..=MAX_WINDOW_MINUTES).contains(&self.window_minutes)
    }

    /// Appointments scheduled strictly before this instant are past the grace window.
    /// Out-of-range windows are clamped into `0..=MAX_WINDOW_MINUTES`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = Duration::minutes(self.window_minutes.clamp(0, MAX_WINDOW_MINUTES));
        now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_overdue(&self, appointment: &AppointmentEntity, now: DateTime<Utc>) -> bool {
        appointment.status == AppointmentStatus::Scheduled
            && !appointment.no_show_fee_charged
            && appointment.scheduled_at < self.cutoff(now)
    }
}
