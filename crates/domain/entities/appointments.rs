use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::enums::{
    appointment_payment_statuses::AppointmentPaymentStatus,
    appointment_statuses::AppointmentStatus, appointment_types::AppointmentType,
};
use crate::infra::db::postgres::schema::appointments;

/// Raw `appointments` row. Text columns are validated by [`AppointmentEntity::try_from`].
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = appointments)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub appointment_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: String,
    pub payment_status: String,
    pub no_show_fee_charged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub appointment_type: AppointmentType,
    pub scheduled_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub payment_status: AppointmentPaymentStatus,
    pub no_show_fee_charged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for AppointmentEntity {
    type Error = anyhow::Error;

    fn try_from(row: AppointmentRow) -> Result<Self> {
        let appointment_type = AppointmentType::from_str(&row.appointment_type).ok_or_else(|| {
            anyhow!(
                "appointment {} has unknown appointment_type {:?}",
                row.id,
                row.appointment_type
            )
        })?;
        let status = AppointmentStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("appointment {} has unknown status {:?}", row.id, row.status))?;
        let payment_status =
            AppointmentPaymentStatus::from_str(&row.payment_status).ok_or_else(|| {
                anyhow!(
                    "appointment {} has unknown payment_status {:?}",
                    row.id,
                    row.payment_status
                )
            })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            appointment_type,
            scheduled_at: row.scheduled_at,
            end_at: row.end_at,
            status,
            payment_status,
            no_show_fee_charged: row.no_show_fee_charged,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = appointments)]
pub struct InsertAppointmentEntity {
    pub user_id: Uuid,
    pub appointment_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: String,
    pub payment_status: String,
    pub no_show_fee_charged: bool,
}

impl InsertAppointmentEntity {
    /// A fresh booking: `scheduled`, payment `pending`, no fee charged.
    pub fn scheduled(
        user_id: Uuid,
        appointment_type: AppointmentType,
        scheduled_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            appointment_type: appointment_type.to_string(),
            scheduled_at,
            end_at,
            status: AppointmentStatus::Scheduled.to_string(),
            payment_status: AppointmentPaymentStatus::Pending.to_string(),
            no_show_fee_charged: false,
        }
    }
}
