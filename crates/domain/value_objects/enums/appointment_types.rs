use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentType {
    #[serde(rename = "consultation")]
    Consultation,
    #[serde(rename = "therapy")]
    Therapy,
    #[serde(rename = "workshop-followup")]
    WorkshopFollowup,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::Therapy => "therapy",
            AppointmentType::WorkshopFollowup => "workshop-followup",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "consultation" => Some(AppointmentType::Consultation),
            "therapy" => Some(AppointmentType::Therapy),
            "workshop-followup" => Some(AppointmentType::WorkshopFollowup),
            _ => None,
        }
    }
}

impl Display for AppointmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
