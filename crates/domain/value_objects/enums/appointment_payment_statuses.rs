use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Payment state mirrored onto the appointment row for the booking views.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentPaymentStatus {
    #[default]
    Pending,
    Authorized,
    Charged,
    Failed,
    Refunded,
    Voided,
}

impl AppointmentPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentPaymentStatus::Pending => "pending",
            AppointmentPaymentStatus::Authorized => "authorized",
            AppointmentPaymentStatus::Charged => "charged",
            AppointmentPaymentStatus::Failed => "failed",
            AppointmentPaymentStatus::Refunded => "refunded",
            AppointmentPaymentStatus::Voided => "voided",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AppointmentPaymentStatus::Pending),
            "authorized" => Some(AppointmentPaymentStatus::Authorized),
            "charged" => Some(AppointmentPaymentStatus::Charged),
            "failed" => Some(AppointmentPaymentStatus::Failed),
            "refunded" => Some(AppointmentPaymentStatus::Refunded),
            "voided" => Some(AppointmentPaymentStatus::Voided),
            _ => None,
        }
    }

    /// Funds are held or already moved for the session.
    pub fn holds_funds(&self) -> bool {
        matches!(
            self,
            AppointmentPaymentStatus::Authorized | AppointmentPaymentStatus::Charged
        )
    }
}

impl Display for AppointmentPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
