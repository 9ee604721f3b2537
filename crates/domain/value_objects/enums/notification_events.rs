use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    PaymentAuthorized,
    PaymentCaptured,
    PaymentRefunded,
    AppointmentCancelled,
    NoShowRecorded,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentAuthorized => "payment_authorized",
            NotificationEvent::PaymentCaptured => "payment_captured",
            NotificationEvent::PaymentRefunded => "payment_refunded",
            NotificationEvent::AppointmentCancelled => "appointment_cancelled",
            NotificationEvent::NoShowRecorded => "no_show_recorded",
        }
    }
}

impl Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
