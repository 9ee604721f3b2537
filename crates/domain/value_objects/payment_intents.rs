use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Authorize only; funds are captured later with an explicit capture call.
    Manual,
    /// Funds move as soon as the intent is confirmed.
    Automatic,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Manual => "manual",
            CaptureMode::Automatic => "automatic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub capture_mode: CaptureMode,
    pub customer: Option<String>,
    pub payment_method: Option<String>,
    /// Confirm in the same call (used for off-session fee charges).
    pub confirm: bool,
    pub off_session: bool,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ProcessorIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            ProcessorIntentStatus::RequiresConfirmation => "requires_confirmation",
            ProcessorIntentStatus::RequiresAction => "requires_action",
            ProcessorIntentStatus::Processing => "processing",
            ProcessorIntentStatus::RequiresCapture => "requires_capture",
            ProcessorIntentStatus::Succeeded => "succeeded",
            ProcessorIntentStatus::Canceled => "canceled",
            ProcessorIntentStatus::Unknown => "unknown",
        }
    }
}

/// The processor's view of an intent after a create/confirm/capture/cancel call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorIntent {
    pub id: String,
    pub status: ProcessorIntentStatus,
    pub amount_minor: i64,
    /// Decline or error message reported by the processor, when any.
    pub failure_message: Option<String>,
}
