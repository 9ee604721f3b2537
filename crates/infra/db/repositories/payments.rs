use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payments},
};
use domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity, PaymentRow, PaymentTransition},
    repositories::payments::PaymentRepository,
    value_objects::enums::{payment_statuses::PaymentStatus, payment_types::PaymentType},
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn insert_pending(&self, payment: InsertPaymentEntity) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The attempt-key and open-attempt unique indexes double as the claim: a racing
        // insert hitting either returns no row instead of an error.
        let row = insert_into(payments::table)
            .values(&payment)
            .on_conflict_do_nothing()
            .returning(PaymentRow::as_returning())
            .get_result::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = payments::table
            .filter(payments::appointment_id.eq(appointment_id))
            .order((payments::created_at.asc(), payments::id.asc()))
            .select(PaymentRow::as_select())
            .load::<PaymentRow>(&mut conn)?;

        rows.into_iter().map(PaymentEntity::try_from).collect()
    }

    async fn count_failed_attempts(
        &self,
        appointment_id: Uuid,
        payment_type: PaymentType,
    ) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let count = payments::table
            .filter(payments::appointment_id.eq(appointment_id))
            .filter(payments::payment_type.eq(payment_type.as_str()))
            .filter(payments::status.eq(PaymentStatus::Failed.as_str()))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(count)
    }

    async fn attach_intent(&self, payment_id: Uuid, provider_intent_id: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(payments::table.filter(payments::id.eq(payment_id)))
            .set((
                payments::provider_intent_id.eq(Some(provider_intent_id)),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn apply_transition(
        &self,
        payment_id: Uuid,
        from: PaymentStatus,
        transition: PaymentTransition,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();
        let status = transition.target_status().to_string();

        let target = payments::table
            .filter(payments::id.eq(payment_id))
            .filter(payments::status.eq(from.as_str()));

        let updated = match transition {
            PaymentTransition::Authorized { at } => update(target)
                .set((
                    payments::status.eq(status),
                    payments::authorized_at.eq(Some(at)),
                    payments::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            PaymentTransition::Charged { at } => update(target)
                .set((
                    payments::status.eq(status),
                    payments::charged_at.eq(Some(at)),
                    payments::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            PaymentTransition::Refunded { at, amount_minor } => update(target)
                .set((
                    payments::status.eq(status),
                    payments::refunded_at.eq(Some(at)),
                    payments::refunded_amount_minor.eq(Some(amount_minor)),
                    payments::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            PaymentTransition::Failed { reason } => update(target)
                .set((
                    payments::status.eq(status),
                    payments::error.eq(Some(reason)),
                    payments::updated_at.eq(now),
                ))
                .execute(&mut conn)?,
            PaymentTransition::Voided => update(target)
                .set((payments::status.eq(status), payments::updated_at.eq(now)))
                .execute(&mut conn)?,
        };

        Ok(updated == 1)
    }
}
