use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// What happens to a freshly booked appointment when the payment authorization fails.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingPolicy {
    /// Keep the booked-but-unpaid appointment and report the payment setup failure.
    #[default]
    Optimistic,
    /// Cancel the appointment again and surface the payment error.
    RequirePayment,
}

impl BookingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingPolicy::Optimistic => "optimistic",
            BookingPolicy::RequirePayment => "require_payment",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Some(BookingPolicy::Optimistic),
            "require_payment" | "require-payment" | "strict" => Some(BookingPolicy::RequirePayment),
            _ => None,
        }
    }
}

impl Display for BookingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
