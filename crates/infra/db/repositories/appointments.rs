use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::appointments},
};
use domain::{
    entities::appointments::{AppointmentEntity, AppointmentRow, InsertAppointmentEntity},
    repositories::appointments::AppointmentRepository,
    value_objects::enums::{
        appointment_payment_statuses::AppointmentPaymentStatus,
        appointment_statuses::AppointmentStatus,
    },
};

pub struct AppointmentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AppointmentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn into_entities(rows: Vec<AppointmentRow>) -> Result<Vec<AppointmentEntity>> {
    rows.into_iter().map(AppointmentEntity::try_from).collect()
}

#[async_trait]
impl AppointmentRepository for AppointmentPostgres {
    async fn create(&self, appointment: InsertAppointmentEntity) -> Result<AppointmentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(appointments::table)
            .values(&appointment)
            .returning(AppointmentRow::as_returning())
            .get_result::<AppointmentRow>(&mut conn)?;

        AppointmentEntity::try_from(row)
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = appointments::table
            .find(appointment_id)
            .select(AppointmentRow::as_select())
            .first::<AppointmentRow>(&mut conn)
            .optional()?;

        row.map(AppointmentEntity::try_from).transpose()
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            appointments::table
                .filter(appointments::id.eq(appointment_id))
                .filter(appointments::status.eq(from.as_str())),
        )
        .set((
            appointments::status.eq(to.as_str()),
            appointments::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }

    async fn update_payment_status(
        &self,
        appointment_id: Uuid,
        payment_status: AppointmentPaymentStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(appointments::table.filter(appointments::id.eq(appointment_id)))
            .set((
                appointments::payment_status.eq(payment_status.as_str()),
                appointments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_no_show_fee_charged(&self, appointment_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            appointments::table
                .filter(appointments::id.eq(appointment_id))
                .filter(appointments::status.eq(AppointmentStatus::NoShow.as_str()))
                .filter(appointments::no_show_fee_charged.eq(false)),
        )
        .set((
            appointments::no_show_fee_charged.eq(true),
            appointments::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }

    async fn list_overdue_scheduled(&self, cutoff: DateTime<Utc>) -> Result<Vec<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = appointments::table
            .filter(appointments::status.eq(AppointmentStatus::Scheduled.as_str()))
            .filter(appointments::no_show_fee_charged.eq(false))
            .filter(appointments::scheduled_at.lt(cutoff))
            .order((appointments::scheduled_at.asc(), appointments::id.asc()))
            .select(AppointmentRow::as_select())
            .load::<AppointmentRow>(&mut conn)?;

        into_entities(rows)
    }

    async fn list_due_for_capture(&self, horizon: DateTime<Utc>) -> Result<Vec<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = appointments::table
            .filter(appointments::status.eq(AppointmentStatus::Scheduled.as_str()))
            .filter(appointments::payment_status.eq(AppointmentPaymentStatus::Authorized.as_str()))
            .filter(appointments::scheduled_at.le(horizon))
            .order((appointments::scheduled_at.asc(), appointments::id.asc()))
            .select(AppointmentRow::as_select())
            .load::<AppointmentRow>(&mut conn)?;

        into_entities(rows)
    }
}
