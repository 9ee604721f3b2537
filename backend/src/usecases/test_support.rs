//! In-memory stores for use-case tests that need state across several calls.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use practice_payments::domain::{
    entities::{
        appointments::{AppointmentEntity, AppointmentRow, InsertAppointmentEntity},
        payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity},
        payments::{
            InsertPaymentEntity, PaymentEntity, PaymentRow, PaymentTransition,
            payment_idempotency_key,
        },
    },
    repositories::{
        appointments::AppointmentRepository, payment_methods::PaymentMethodRepository,
        payments::PaymentRepository,
    },
    value_objects::enums::{
        appointment_payment_statuses::AppointmentPaymentStatus,
        appointment_statuses::AppointmentStatus, appointment_types::AppointmentType,
        payment_statuses::PaymentStatus, payment_types::PaymentType,
    },
};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct InMemoryStore {
    appointments: Mutex<Vec<AppointmentEntity>>,
    payments: Mutex<Vec<PaymentEntity>>,
    methods: Mutex<Vec<PaymentMethodEntity>>,
}

impl InMemoryStore {
    pub(crate) fn seed_appointment(
        &self,
        user_id: Uuid,
        scheduled_at: DateTime<Utc>,
        status: AppointmentStatus,
    ) -> AppointmentEntity {
        let now = Utc::now();
        let appointment = AppointmentEntity {
            id: Uuid::new_v4(),
            user_id,
            appointment_type: AppointmentType::Therapy,
            scheduled_at,
            end_at: None,
            status,
            payment_status: AppointmentPaymentStatus::Pending,
            no_show_fee_charged: false,
            created_at: now,
            updated_at: now,
        };
        self.appointments.lock().unwrap().push(appointment.clone());
        appointment
    }

    pub(crate) fn seed_default_method(&self, user_id: Uuid) -> PaymentMethodEntity {
        let method = PaymentMethodEntity {
            id: Uuid::new_v4(),
            user_id,
            provider_customer_id: "cus_test".to_string(),
            provider_method_id: "pm_card_visa".to_string(),
            brand: Some("visa".to_string()),
            last4: Some("4242".to_string()),
            exp_month: Some(12),
            exp_year: Some(2030),
            is_default: true,
            created_at: Utc::now(),
        };
        self.methods.lock().unwrap().push(method.clone());
        method
    }

    /// Inserts a payment row directly in `status`, as if earlier calls had produced it.
    pub(crate) fn seed_payment(
        &self,
        appointment: &AppointmentEntity,
        payment_type: PaymentType,
        status: PaymentStatus,
        intent_id: &str,
        amount_minor: i64,
    ) -> PaymentEntity {
        let mut payments = self.payments.lock().unwrap();
        let attempt = payments
            .iter()
            .filter(|p| p.appointment_id == appointment.id && p.payment_type == payment_type)
            .count() as i64;
        let now = Utc::now();
        let payment = PaymentEntity {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            user_id: appointment.user_id,
            amount_minor,
            currency: "usd".to_string(),
            provider_intent_id: Some(intent_id.to_string()),
            status,
            payment_type,
            idempotency_key: payment_idempotency_key(payment_type, appointment.id, attempt),
            error: None,
            authorized_at: Some(now),
            charged_at: None,
            refunded_at: None,
            refunded_amount_minor: None,
            created_at: now,
            updated_at: now,
        };
        payments.push(payment.clone());
        payment
    }

    pub(crate) fn appointment(&self, id: Uuid) -> AppointmentEntity {
        self.appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .expect("appointment seeded")
    }

    pub(crate) fn all_appointments(&self) -> Vec<AppointmentEntity> {
        self.appointments.lock().unwrap().clone()
    }

    pub(crate) fn payments_for(&self, appointment_id: Uuid) -> Vec<PaymentEntity> {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.appointment_id == appointment_id)
            .cloned()
            .collect()
    }

    pub(crate) fn defaults_for(&self, user_id: Uuid) -> usize {
        self.methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.is_default)
            .count()
    }

    fn with_appointment<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut AppointmentEntity) -> T,
    ) -> Result<T> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("appointment {id} missing"))?;
        let out = f(appointment);
        appointment.updated_at = Utc::now();
        Ok(out)
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn create(&self, appointment: InsertAppointmentEntity) -> Result<AppointmentEntity> {
        let now = Utc::now();
        let entity = AppointmentEntity::try_from(AppointmentRow {
            id: Uuid::new_v4(),
            user_id: appointment.user_id,
            appointment_type: appointment.appointment_type,
            scheduled_at: appointment.scheduled_at,
            end_at: appointment.end_at,
            status: appointment.status,
            payment_status: appointment.payment_status,
            no_show_fee_charged: appointment.no_show_fee_charged,
            created_at: now,
            updated_at: now,
        })?;
        self.appointments.lock().unwrap().push(entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentEntity>> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned())
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool> {
        self.with_appointment(appointment_id, |a| {
            if a.status != from {
                return false;
            }
            a.status = to;
            true
        })
    }

    async fn update_payment_status(
        &self,
        appointment_id: Uuid,
        payment_status: AppointmentPaymentStatus,
    ) -> Result<()> {
        self.with_appointment(appointment_id, |a| a.payment_status = payment_status)
    }

    async fn mark_no_show_fee_charged(&self, appointment_id: Uuid) -> Result<bool> {
        self.with_appointment(appointment_id, |a| {
            if a.status != AppointmentStatus::NoShow || a.no_show_fee_charged {
                return false;
            }
            a.no_show_fee_charged = true;
            true
        })
    }

    async fn list_overdue_scheduled(&self, cutoff: DateTime<Utc>) -> Result<Vec<AppointmentEntity>> {
        let mut rows: Vec<_> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.status == AppointmentStatus::Scheduled
                    && !a.no_show_fee_charged
                    && a.scheduled_at < cutoff
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.scheduled_at);
        Ok(rows)
    }

    async fn list_due_for_capture(&self, horizon: DateTime<Utc>) -> Result<Vec<AppointmentEntity>> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.status == AppointmentStatus::Scheduled
                    && a.payment_status == AppointmentPaymentStatus::Authorized
                    && a.scheduled_at <= horizon
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_pending(&self, payment: InsertPaymentEntity) -> Result<Option<PaymentEntity>> {
        let mut payments = self.payments.lock().unwrap();
        let conflict = payments.iter().any(|p| {
            p.appointment_id == payment.appointment_id
                && p.payment_type.as_str() == payment.payment_type
                && (p.idempotency_key == payment.idempotency_key
                    || matches!(
                        p.status,
                        PaymentStatus::Pending | PaymentStatus::Authorized | PaymentStatus::Charged
                    ))
        });
        if conflict {
            return Ok(None);
        }

        let now = Utc::now();
        let entity = PaymentEntity::try_from(PaymentRow {
            id: Uuid::new_v4(),
            appointment_id: payment.appointment_id,
            user_id: payment.user_id,
            amount_minor: payment.amount_minor,
            currency: payment.currency,
            provider_intent_id: payment.provider_intent_id,
            status: payment.status,
            payment_type: payment.payment_type,
            idempotency_key: payment.idempotency_key,
            error: None,
            authorized_at: None,
            charged_at: None,
            refunded_at: None,
            refunded_amount_minor: None,
            created_at: now,
            updated_at: now,
        })?;
        payments.push(entity.clone());
        Ok(Some(entity))
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<PaymentEntity>> {
        Ok(self.payments_for(appointment_id))
    }

    async fn count_failed_attempts(
        &self,
        appointment_id: Uuid,
        payment_type: PaymentType,
    ) -> Result<i64> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.appointment_id == appointment_id
                    && p.payment_type == payment_type
                    && p.status == PaymentStatus::Failed
            })
            .count() as i64)
    }

    async fn attach_intent(&self, payment_id: Uuid, provider_intent_id: String) -> Result<()> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| anyhow!("payment {payment_id} missing"))?;
        payment.provider_intent_id = Some(provider_intent_id);
        Ok(())
    }

    async fn apply_transition(
        &self,
        payment_id: Uuid,
        from: PaymentStatus,
        transition: PaymentTransition,
    ) -> Result<bool> {
        let mut payments = self.payments.lock().unwrap();
        let Some(payment) = payments
            .iter_mut()
            .find(|p| p.id == payment_id && p.status == from)
        else {
            return Ok(false);
        };

        payment.status = transition.target_status();
        match transition {
            PaymentTransition::Authorized { at } => payment.authorized_at = Some(at),
            PaymentTransition::Charged { at } => payment.charged_at = Some(at),
            PaymentTransition::Refunded { at, amount_minor } => {
                payment.refunded_at = Some(at);
                payment.refunded_amount_minor = Some(amount_minor);
            }
            PaymentTransition::Failed { reason } => payment.error = Some(reason),
            PaymentTransition::Voided => {}
        }
        Ok(true)
    }
}

#[async_trait]
impl PaymentMethodRepository for InMemoryStore {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PaymentMethodEntity>> {
        let mut rows: Vec<_> = self
            .methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn find_default(&self, user_id: Uuid) -> Result<Option<PaymentMethodEntity>> {
        Ok(self
            .methods
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.is_default)
            .cloned())
    }

    async fn insert(
        &self,
        payment_method: InsertPaymentMethodEntity,
        make_default: bool,
    ) -> Result<PaymentMethodEntity> {
        let mut methods = self.methods.lock().unwrap();
        let first = !methods.iter().any(|m| m.user_id == payment_method.user_id);
        let is_default = make_default || first;
        if is_default {
            for m in methods.iter_mut().filter(|m| m.user_id == payment_method.user_id) {
                m.is_default = false;
            }
        }
        let entity = PaymentMethodEntity {
            id: Uuid::new_v4(),
            user_id: payment_method.user_id,
            provider_customer_id: payment_method.provider_customer_id,
            provider_method_id: payment_method.provider_method_id,
            brand: payment_method.brand,
            last4: payment_method.last4,
            exp_month: payment_method.exp_month,
            exp_year: payment_method.exp_year,
            is_default,
            created_at: Utc::now(),
        };
        methods.push(entity.clone());
        Ok(entity)
    }

    async fn set_default(&self, user_id: Uuid, method_id: Uuid) -> Result<bool> {
        let mut methods = self.methods.lock().unwrap();
        if !methods.iter().any(|m| m.user_id == user_id && m.id == method_id) {
            return Ok(false);
        }
        for m in methods.iter_mut().filter(|m| m.user_id == user_id) {
            m.is_default = m.id == method_id;
        }
        Ok(true)
    }
}
