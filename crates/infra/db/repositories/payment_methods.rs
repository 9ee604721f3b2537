use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_methods},
};
use domain::{
    entities::payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity},
    repositories::payment_methods::PaymentMethodRepository,
};

pub struct PaymentMethodPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentMethodPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentMethodRepository for PaymentMethodPostgres {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payment_methods::table
            .filter(payment_methods::user_id.eq(user_id))
            .order((
                payment_methods::is_default.desc(),
                payment_methods::created_at.asc(),
                payment_methods::id.asc(),
            ))
            .select(PaymentMethodEntity::as_select())
            .load::<PaymentMethodEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_default(&self, user_id: Uuid) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payment_methods::table
            .filter(payment_methods::user_id.eq(user_id))
            .filter(payment_methods::is_default.eq(true))
            .select(PaymentMethodEntity::as_select())
            .first::<PaymentMethodEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert(
        &self,
        payment_method: InsertPaymentMethodEntity,
        make_default: bool,
    ) -> Result<PaymentMethodEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let user_id = payment_method.user_id;

        let inserted = conn.transaction::<PaymentMethodEntity, diesel::result::Error, _>(|tx| {
            // Lock the user's rows so concurrent inserts/set_default calls serialize.
            let existing = payment_methods::table
                .filter(payment_methods::user_id.eq(user_id))
                .select(payment_methods::id)
                .for_update()
                .load::<Uuid>(tx)?;

            let is_default = make_default || existing.is_empty();
            if is_default {
                update(
                    payment_methods::table
                        .filter(payment_methods::user_id.eq(user_id))
                        .filter(payment_methods::is_default.eq(true)),
                )
                .set(payment_methods::is_default.eq(false))
                .execute(tx)?;
            }

            insert_into(payment_methods::table)
                .values(&InsertPaymentMethodEntity {
                    is_default,
                    ..payment_method
                })
                .returning(PaymentMethodEntity::as_returning())
                .get_result::<PaymentMethodEntity>(tx)
        })?;

        Ok(inserted)
    }

    async fn set_default(&self, user_id: Uuid, method_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changed = conn.transaction::<bool, diesel::result::Error, _>(|tx| {
            let owned = payment_methods::table
                .filter(payment_methods::user_id.eq(user_id))
                .select(payment_methods::id)
                .for_update()
                .load::<Uuid>(tx)?;

            if !owned.contains(&method_id) {
                return Ok(false);
            }

            // Both statements commit together; other sessions never see zero or two defaults.
            update(
                payment_methods::table
                    .filter(payment_methods::user_id.eq(user_id))
                    .filter(payment_methods::id.ne(method_id))
                    .filter(payment_methods::is_default.eq(true)),
            )
            .set(payment_methods::is_default.eq(false))
            .execute(tx)?;

            update(payment_methods::table.filter(payment_methods::id.eq(method_id)))
                .set(payment_methods::is_default.eq(true))
                .execute(tx)?;

            Ok(true)
        })?;

        Ok(changed)
    }
}
