use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Appointment,
    NoShowFee,
    CancellationFee,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Appointment => "appointment",
            PaymentType::NoShowFee => "no_show_fee",
            PaymentType::CancellationFee => "cancellation_fee",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "appointment" => Some(PaymentType::Appointment),
            "no_show_fee" => Some(PaymentType::NoShowFee),
            "cancellation_fee" => Some(PaymentType::CancellationFee),
            _ => None,
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
