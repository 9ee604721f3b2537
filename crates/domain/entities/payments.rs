use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::{payment_statuses::PaymentStatus, payment_types::PaymentType},
    money::CURRENCY,
};
use crate::infra::db::postgres::schema::payments;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentRow {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub provider_intent_id: Option<String>,
    pub status: String,
    pub payment_type: String,
    pub idempotency_key: String,
    pub error: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub charged_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refunded_amount_minor: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub provider_intent_id: Option<String>,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub idempotency_key: String,
    pub error: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub charged_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refunded_amount_minor: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentEntity {
    type Error = anyhow::Error;

    fn try_from(row: PaymentRow) -> Result<Self> {
        let status = PaymentStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("payment {} has unknown status {:?}", row.id, row.status))?;
        let payment_type = PaymentType::from_str(&row.payment_type).ok_or_else(|| {
            anyhow!("payment {} has unknown payment_type {:?}", row.id, row.payment_type)
        })?;
        if row.amount_minor <= 0 {
            return Err(anyhow!(
                "payment {} has non-positive amount_minor {}",
                row.id,
                row.amount_minor
            ));
        }

        Ok(Self {
            id: row.id,
            appointment_id: row.appointment_id,
            user_id: row.user_id,
            amount_minor: row.amount_minor,
            currency: row.currency,
            provider_intent_id: row.provider_intent_id,
            status,
            payment_type,
            idempotency_key: row.idempotency_key,
            error: row.error,
            authorized_at: row.authorized_at,
            charged_at: row.charged_at,
            refunded_at: row.refunded_at,
            refunded_amount_minor: row.refunded_amount_minor,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub appointment_id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub provider_intent_id: Option<String>,
    pub status: String,
    pub payment_type: String,
    pub idempotency_key: String,
}

impl InsertPaymentEntity {
    pub fn pending(
        appointment_id: Uuid,
        user_id: Uuid,
        amount_minor: i64,
        payment_type: PaymentType,
        idempotency_key: String,
    ) -> Self {
        Self {
            appointment_id,
            user_id,
            amount_minor,
            currency: CURRENCY.to_string(),
            provider_intent_id: None,
            status: PaymentStatus::Pending.to_string(),
            payment_type: payment_type.to_string(),
            idempotency_key,
        }
    }
}

/// A status change on one payment row, with the columns that change alongside it.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentTransition {
    Authorized { at: DateTime<Utc> },
    Charged { at: DateTime<Utc> },
    Refunded { at: DateTime<Utc>, amount_minor: i64 },
    Failed { reason: String },
    Voided,
}

impl PaymentTransition {
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            PaymentTransition::Authorized { .. } => PaymentStatus::Authorized,
            PaymentTransition::Charged { .. } => PaymentStatus::Charged,
            PaymentTransition::Refunded { .. } => PaymentStatus::Refunded,
            PaymentTransition::Failed { .. } => PaymentStatus::Failed,
            PaymentTransition::Voided => PaymentStatus::Voided,
        }
    }
}

/// Idempotency key for a payment of `payment_type` on an appointment after `attempt`
/// failed tries.
///
/// Two racing callers that observed the same number of failures derive the same key,
/// so the unique `(appointment_id, payment_type, idempotency_key)` index lets only one of
/// them insert, and the processor deduplicates the matching `Idempotency-Key` header.
pub fn payment_idempotency_key(payment_type: PaymentType, appointment_id: Uuid, attempt: i64) -> String {
    format!("{payment_type}-{appointment_id}-{attempt}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_per_attempt() {
        let appointment_id = Uuid::new_v4();
        let first = payment_idempotency_key(PaymentType::NoShowFee, appointment_id, 0);
        assert_eq!(first, payment_idempotency_key(PaymentType::NoShowFee, appointment_id, 0));
        assert_ne!(first, payment_idempotency_key(PaymentType::NoShowFee, appointment_id, 1));
        assert_ne!(first, payment_idempotency_key(PaymentType::Appointment, appointment_id, 0));
        assert!(first.starts_with("no_show_fee-"));
    }

    #[test]
    fn transitions_map_to_their_status() {
        let at = Utc::now();
        assert_eq!(
            PaymentTransition::Refunded { at, amount_minor: 100 }.target_status(),
            PaymentStatus::Refunded
        );
        assert_eq!(PaymentTransition::Voided.target_status(), PaymentStatus::Voided);
    }
}
