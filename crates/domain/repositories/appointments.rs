use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::appointments::{AppointmentEntity, InsertAppointmentEntity},
    value_objects::enums::{
        appointment_payment_statuses::AppointmentPaymentStatus,
        appointment_statuses::AppointmentStatus,
    },
};

#[automock]
#[async_trait]
pub trait AppointmentRepository {
    async fn create(&self, appointment: InsertAppointmentEntity) -> Result<AppointmentEntity>;

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentEntity>>;

    /// Moves the appointment from `from` to `to`. Returns `false` when the row was no longer
    /// in `from` (e.g. cancelled concurrently), in which case nothing changes.
    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool>;

    async fn update_payment_status(
        &self,
        appointment_id: Uuid,
        payment_status: AppointmentPaymentStatus,
    ) -> Result<()>;

    /// Sets `no_show_fee_charged = true` on a `no_show` appointment that has no fee yet.
    /// Returns `false` when the row was in any other state. The flag never reverts.
    async fn mark_no_show_fee_charged(&self, appointment_id: Uuid) -> Result<bool>;

    /// Scheduled appointments with no fee charged whose `scheduled_at` is before `cutoff`.
    async fn list_overdue_scheduled(&self, cutoff: DateTime<Utc>) -> Result<Vec<AppointmentEntity>>;

    /// Scheduled appointments holding an authorization that start at or before `horizon`.
    async fn list_due_for_capture(&self, horizon: DateTime<Utc>) -> Result<Vec<AppointmentEntity>>;
}
