use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use practice_payments::domain::{
    entities::{
        appointments::{AppointmentEntity, InsertAppointmentEntity},
        payments::{InsertPaymentEntity, PaymentEntity, PaymentTransition, payment_idempotency_key},
    },
    repositories::{
        appointments::AppointmentRepository, notifications::NotificationDispatcher,
        payment_gateway::PaymentGateway, payment_methods::PaymentMethodRepository,
        payments::PaymentRepository,
    },
    value_objects::{
        booking::BookingPolicy,
        enums::{
            appointment_payment_statuses::AppointmentPaymentStatus,
            appointment_statuses::AppointmentStatus, appointment_types::AppointmentType,
            notification_events::NotificationEvent, payment_statuses::PaymentStatus,
            payment_types::PaymentType,
        },
        money::{format_minor_units, to_minor_units},
        payment_intents::{CaptureMode, CreateIntentRequest, ProcessorIntentStatus},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::payment_errors::{PaymentError, PaymentResult};

pub const DEFAULT_CAPTURE_LEAD_HOURS: i64 = 24;
pub const MAX_CAPTURE_LEAD_HOURS: i64 = 7 * 24;

/// Capture lead time for `hours`, or `None` outside `0..=MAX_CAPTURE_LEAD_HOURS`.
pub fn capture_lead_time(hours: i64) -> Option<Duration> {
    (0..=MAX_CAPTURE_LEAD_HOURS)
        .contains(&hours)
        .then(|| Duration::hours(hours))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub appointment_type: AppointmentType,
    pub scheduled_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizedPayment {
    pub payment_id: Uuid,
    pub intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "payment_status", rename_all = "snake_case")]
pub enum PaymentSetup {
    Authorized(AuthorizedPayment),
    PaymentSetupFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: AppointmentEntity,
    #[serde(flatten)]
    pub payment: PaymentSetup,
}

/// What happened to the appointment's money when it was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "payment_resolution", rename_all = "snake_case")]
pub enum PaymentResolution {
    NoPayment,
    Refunded { amount_minor: i64 },
    Voided,
    RefundFailed { reason: String },
    VoidFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    #[serde(flatten)]
    pub payment: PaymentResolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureFailure {
    pub appointment_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureSweepResult {
    pub scanned: usize,
    pub captured: usize,
    pub failed: usize,
    pub captured_ids: Vec<Uuid>,
    pub failures: Vec<CaptureFailure>,
}

pub struct PaymentLifecycleUseCase {
    appointment_repo: Arc<dyn AppointmentRepository + Send + Sync>,
    payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
    payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway + Send + Sync>,
    notifier: Arc<dyn NotificationDispatcher + Send + Sync>,
    booking_policy: BookingPolicy,
}

impl PaymentLifecycleUseCase {
    pub fn new(
        appointment_repo: Arc<dyn AppointmentRepository + Send + Sync>,
        payment_repo: Arc<dyn PaymentRepository + Send + Sync>,
        payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway + Send + Sync>,
        notifier: Arc<dyn NotificationDispatcher + Send + Sync>,
        booking_policy: BookingPolicy,
    ) -> Self {
        Self {
            appointment_repo,
            payment_repo,
            payment_method_repo,
            gateway,
            notifier,
            booking_policy,
        }
    }

    /// Places an authorize-only hold for the appointment against the user's default method.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
        amount_major: f64,
        description: Option<String>,
    ) -> PaymentResult<AuthorizedPayment> {
        let amount_minor = to_minor_units(amount_major).ok_or(PaymentError::InvalidAmount)?;
        let appointment = self.load_owned_appointment(user_id, appointment_id).await?;

        if appointment.status.is_terminal() {
            return Err(PaymentError::PreconditionFailed(format!(
                "appointment is {}",
                appointment.status
            )));
        }
        if appointment.payment_status.holds_funds() {
            return Err(PaymentError::PreconditionFailed(format!(
                "appointment payment is already {}",
                appointment.payment_status
            )));
        }

        let open_attempt = self
            .appointment_payments(appointment_id)
            .await?
            .into_iter()
            .any(|p| {
                matches!(
                    p.status,
                    PaymentStatus::Pending | PaymentStatus::Authorized | PaymentStatus::Charged
                )
            });
        if open_attempt {
            return Err(PaymentError::PreconditionFailed(
                "an appointment payment is already in progress".to_string(),
            ));
        }

        let method = self.payment_method_repo.find_default(user_id).await?;
        let payment = self
            .claim_payment(&appointment, amount_minor, PaymentType::Appointment)
            .await?;

        let request = CreateIntentRequest {
            amount_minor,
            currency: payment.currency.clone(),
            capture_mode: CaptureMode::Manual,
            customer: method.as_ref().map(|m| m.provider_customer_id.clone()),
            payment_method: method.as_ref().map(|m| m.provider_method_id.clone()),
            confirm: false,
            off_session: false,
            description,
            metadata: intent_metadata(&payment),
            idempotency_key: operation_key(&payment, "create"),
        };

        let intent = match self.gateway.create_intent(request).await {
            Ok(intent) => intent,
            Err(err) => return Err(self.authorization_failed(&payment, err.to_string()).await),
        };

        self.payment_repo
            .attach_intent(payment.id, intent.id.clone())
            .await
            .map_err(|err| {
                error!(
                    payment_id = %payment.id,
                    intent_id = %intent.id,
                    db_error = ?err,
                    "payments: failed to attach intent to pending payment"
                );
                PaymentError::Internal(err)
            })?;

        let confirmed = match self
            .gateway
            .confirm_intent(&intent.id, &operation_key(&payment, "confirm"))
            .await
        {
            Ok(confirmed) => confirmed,
            Err(err) => return Err(self.authorization_failed(&payment, err.to_string()).await),
        };

        if confirmed.status != ProcessorIntentStatus::RequiresCapture {
            let reason = confirmed.failure_message.clone().unwrap_or_else(|| {
                format!("authorization ended in status {}", confirmed.status.as_str())
            });
            return Err(self.authorization_failed(&payment, reason).await);
        }

        self.persist_after_money_moved(
            &payment,
            &intent.id,
            PaymentStatus::Pending,
            PaymentTransition::Authorized { at: Utc::now() },
            "authorization",
        )
        .await?;
        self.set_payment_status_after_money_moved(
            &payment,
            &intent.id,
            AppointmentPaymentStatus::Authorized,
            "authorization",
        )
        .await?;

        info!(
            %user_id,
            %appointment_id,
            payment_id = %payment.id,
            intent_id = %intent.id,
            amount_minor,
            "payments: authorized"
        );

        self.notify(
            user_id,
            NotificationEvent::PaymentAuthorized,
            json!({
                "appointment_id": appointment_id,
                "amount": format_minor_units(amount_minor),
            }),
        )
        .await;

        Ok(AuthorizedPayment {
            payment_id: payment.id,
            intent_id: intent.id,
        })
    }

    /// Captures the appointment's single authorized payment.
    pub async fn capture(&self, appointment_id: Uuid) -> PaymentResult<PaymentEntity> {
        let appointment = self.load_appointment(appointment_id).await?;
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(PaymentError::PreconditionFailed(
                "appointment is cancelled".to_string(),
            ));
        }

        let payments = self.appointment_payments(appointment_id).await?;
        let mut authorized = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Authorized);
        let payment = match (authorized.next(), authorized.next()) {
            (Some(payment), None) => payment.clone(),
            (Some(_), Some(_)) => {
                return Err(PaymentError::PreconditionFailed(
                    "appointment has more than one authorized payment".to_string(),
                ));
            }
            (None, _) => {
                return Err(match payments.last() {
                    None => PaymentError::RecordNotFound,
                    Some(latest) => PaymentError::PreconditionFailed(format!(
                        "appointment payment is {}, not authorized",
                        latest.status
                    )),
                });
            }
        };

        let intent_id = payment.provider_intent_id.clone().ok_or_else(|| {
            PaymentError::PreconditionFailed("authorized payment has no processor intent".to_string())
        })?;

        let captured = self
            .gateway
            .capture_intent(&intent_id, &operation_key(&payment, "capture"))
            .await
            .map_err(|err| {
                error!(
                    %appointment_id,
                    payment_id = %payment.id,
                    %intent_id,
                    error = ?err,
                    "payments: capture failed; authorization kept for retry"
                );
                PaymentError::ExternalProcessor(err.to_string())
            })?;

        if captured.status != ProcessorIntentStatus::Succeeded {
            warn!(
                %appointment_id,
                %intent_id,
                status = captured.status.as_str(),
                "payments: capture did not succeed"
            );
            return Err(PaymentError::ExternalProcessor(format!(
                "capture ended in status {}",
                captured.status.as_str()
            )));
        }

        let charged_at = Utc::now();
        self.persist_after_money_moved(
            &payment,
            &intent_id,
            PaymentStatus::Authorized,
            PaymentTransition::Charged { at: charged_at },
            "capture",
        )
        .await?;
        self.set_payment_status_after_money_moved(
            &payment,
            &intent_id,
            AppointmentPaymentStatus::Charged,
            "capture",
        )
        .await?;

        info!(
            %appointment_id,
            payment_id = %payment.id,
            %intent_id,
            amount_minor = payment.amount_minor,
            "payments: captured"
        );

        self.notify(
            appointment.user_id,
            NotificationEvent::PaymentCaptured,
            json!({
                "appointment_id": appointment_id,
                "amount": format_minor_units(payment.amount_minor),
            }),
        )
        .await;

        Ok(PaymentEntity {
            status: PaymentStatus::Charged,
            charged_at: Some(charged_at),
            ..payment
        })
    }

    /// Charges the no-show fee off-session against the user's default method. At most one
    /// fee is ever charged per appointment.
    pub async fn charge_fee(&self, appointment_id: Uuid, fee_major: f64) -> PaymentResult<PaymentEntity> {
        let amount_minor = to_minor_units(fee_major).ok_or(PaymentError::InvalidAmount)?;
        let appointment = self.load_appointment(appointment_id).await?;

        if !matches!(
            appointment.status,
            AppointmentStatus::Scheduled | AppointmentStatus::NoShow
        ) {
            return Err(PaymentError::PreconditionFailed(format!(
                "appointment is {}",
                appointment.status
            )));
        }
        if appointment.no_show_fee_charged {
            return Err(PaymentError::PreconditionFailed(
                "no-show fee already charged".to_string(),
            ));
        }

        let payments = self.payment_repo.list_by_appointment(appointment_id).await?;
        let fee_taken = payments.iter().any(|p| {
            p.payment_type == PaymentType::NoShowFee
                && matches!(
                    p.status,
                    PaymentStatus::Pending
                        | PaymentStatus::Authorized
                        | PaymentStatus::Charged
                        | PaymentStatus::Refunded
                )
        });
        if fee_taken {
            return Err(PaymentError::PreconditionFailed(
                "no-show fee already charged or in progress".to_string(),
            ));
        }

        let method = self
            .payment_method_repo
            .find_default(appointment.user_id)
            .await?
            .ok_or(PaymentError::NoPaymentMethod)?;

        // A fee only ever applies to a no-show; a concurrent cancellation wins.
        if appointment.status == AppointmentStatus::Scheduled
            && !self
                .appointment_repo
                .transition_status(
                    appointment_id,
                    AppointmentStatus::Scheduled,
                    AppointmentStatus::NoShow,
                )
                .await?
        {
            return Err(PaymentError::PreconditionFailed(
                "appointment is no longer scheduled".to_string(),
            ));
        }

        let payment = self
            .claim_payment(&appointment, amount_minor, PaymentType::NoShowFee)
            .await?;

        let request = CreateIntentRequest {
            amount_minor,
            currency: payment.currency.clone(),
            capture_mode: CaptureMode::Automatic,
            customer: Some(method.provider_customer_id.clone()),
            payment_method: Some(method.provider_method_id.clone()),
            confirm: true,
            off_session: true,
            description: Some(format!("No-show fee for appointment {appointment_id}")),
            metadata: intent_metadata(&payment),
            idempotency_key: operation_key(&payment, "create"),
        };

        let intent = match self.gateway.create_intent(request).await {
            Ok(intent) => intent,
            Err(err) => {
                let reason = err.to_string();
                warn!(
                    %appointment_id,
                    payment_id = %payment.id,
                    reason = %reason,
                    "payments: no-show fee charge failed"
                );
                self.fail_payment(&payment, PaymentStatus::Pending, &reason).await;
                return Err(PaymentError::ExternalProcessor(reason));
            }
        };

        let attached = self
            .payment_repo
            .attach_intent(payment.id, intent.id.clone())
            .await;

        if intent.status != ProcessorIntentStatus::Succeeded {
            if let Err(err) = attached {
                warn!(payment_id = %payment.id, db_error = ?err, "payments: failed to attach declined intent");
            }
            let reason = intent.failure_message.clone().unwrap_or_else(|| {
                format!("fee charge ended in status {}", intent.status.as_str())
            });
            warn!(
                %appointment_id,
                payment_id = %payment.id,
                intent_id = %intent.id,
                reason = %reason,
                "payments: no-show fee charge failed"
            );
            self.fail_payment(&payment, PaymentStatus::Pending, &reason).await;
            return Err(PaymentError::ExternalProcessor(reason));
        }

        if let Err(err) = attached {
            return Err(reconciliation_error(&payment, &intent.id, "no-show fee", &err));
        }

        let charged_at = Utc::now();
        self.persist_after_money_moved(
            &payment,
            &intent.id,
            PaymentStatus::Pending,
            PaymentTransition::Charged { at: charged_at },
            "no-show fee",
        )
        .await?;

        match self
            .appointment_repo
            .mark_no_show_fee_charged(appointment_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return Err(reconciliation_error(
                    &payment,
                    &intent.id,
                    "no-show fee",
                    &anyhow::anyhow!("appointment was no longer an uncharged no-show"),
                ));
            }
            Err(err) => return Err(reconciliation_error(&payment, &intent.id, "no-show fee", &err)),
        }

        info!(
            %appointment_id,
            payment_id = %payment.id,
            intent_id = %intent.id,
            amount_minor,
            "payments: no-show fee charged"
        );

        Ok(PaymentEntity {
            status: PaymentStatus::Charged,
            provider_intent_id: Some(intent.id),
            charged_at: Some(charged_at),
            ..payment
        })
    }

    /// Refunds the appointment's charged payment in full, or `amount_major` of it.
    /// Returns the amount the processor refunded, in cents.
    pub async fn refund(&self, appointment_id: Uuid, amount_major: Option<f64>) -> PaymentResult<i64> {
        let amount_minor = amount_major
            .map(|amount| to_minor_units(amount).ok_or(PaymentError::InvalidAmount))
            .transpose()?;
        let appointment = self.load_appointment(appointment_id).await?;

        let payments = self.appointment_payments(appointment_id).await?;
        let charged: Vec<&PaymentEntity> = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Charged)
            .collect();
        let payment = match charged.as_slice() {
            [] => return Err(PaymentError::NoChargeFound),
            [payment] => (*payment).clone(),
            _ => {
                return Err(PaymentError::PreconditionFailed(
                    "appointment has more than one charged payment".to_string(),
                ));
            }
        };

        if amount_minor.is_some_and(|amount| amount > payment.amount_minor) {
            return Err(PaymentError::InvalidAmount);
        }

        let intent_id = payment.provider_intent_id.clone().ok_or_else(|| {
            PaymentError::PreconditionFailed("charged payment has no processor intent".to_string())
        })?;

        let refunded_minor = self
            .gateway
            .refund_intent(&intent_id, amount_minor, &operation_key(&payment, "refund"))
            .await
            .map_err(|err| {
                error!(
                    %appointment_id,
                    payment_id = %payment.id,
                    %intent_id,
                    error = ?err,
                    "payments: refund failed"
                );
                PaymentError::ExternalProcessor(err.to_string())
            })?;

        self.persist_after_money_moved(
            &payment,
            &intent_id,
            PaymentStatus::Charged,
            PaymentTransition::Refunded {
                at: Utc::now(),
                amount_minor: refunded_minor,
            },
            "refund",
        )
        .await?;
        self.set_payment_status_after_money_moved(
            &payment,
            &intent_id,
            AppointmentPaymentStatus::Refunded,
            "refund",
        )
        .await?;

        info!(
            %appointment_id,
            payment_id = %payment.id,
            %intent_id,
            refunded_minor,
            "payments: refunded"
        );

        self.notify(
            appointment.user_id,
            NotificationEvent::PaymentRefunded,
            json!({
                "appointment_id": appointment_id,
                "amount": format_minor_units(refunded_minor),
            }),
        )
        .await;

        Ok(refunded_minor)
    }

    /// Creates a scheduled appointment and authorizes its payment. What happens to the
    /// appointment when authorization fails depends on the booking policy.
    pub async fn book_appointment(
        &self,
        user_id: Uuid,
        new_appointment: NewAppointment,
        amount_major: f64,
        description: Option<String>,
    ) -> PaymentResult<BookingOutcome> {
        if to_minor_units(amount_major).is_none() {
            return Err(PaymentError::InvalidAmount);
        }
        if new_appointment
            .end_at
            .is_some_and(|end_at| end_at <= new_appointment.scheduled_at)
        {
            return Err(PaymentError::PreconditionFailed(
                "end_at must be after scheduled_at".to_string(),
            ));
        }

        let mut appointment = self
            .appointment_repo
            .create(InsertAppointmentEntity::scheduled(
                user_id,
                new_appointment.appointment_type,
                new_appointment.scheduled_at,
                new_appointment.end_at,
            ))
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "payments: failed to create appointment");
                PaymentError::Internal(err)
            })?;

        info!(
            %user_id,
            appointment_id = %appointment.id,
            scheduled_at = %appointment.scheduled_at,
            "payments: appointment booked"
        );

        match self
            .authorize(user_id, appointment.id, amount_major, description)
            .await
        {
            Ok(authorized) => {
                appointment.payment_status = AppointmentPaymentStatus::Authorized;
                Ok(BookingOutcome {
                    appointment,
                    payment: PaymentSetup::Authorized(authorized),
                })
            }
            Err(err) => match self.booking_policy {
                BookingPolicy::Optimistic => {
                    warn!(
                        %user_id,
                        appointment_id = %appointment.id,
                        error = %err,
                        "payments: booking kept without payment setup"
                    );
                    if matches!(err, PaymentError::ExternalProcessor(_)) {
                        appointment.payment_status = AppointmentPaymentStatus::Failed;
                    }
                    Ok(BookingOutcome {
                        appointment,
                        payment: PaymentSetup::PaymentSetupFailed {
                            reason: err.public_message(),
                        },
                    })
                }
                BookingPolicy::RequirePayment => {
                    // A hold may exist when persistence failed; leave the booking for reconciliation.
                    if !matches!(err, PaymentError::Persistence { .. }) {
                        self.release_unpaid_booking(appointment.id).await;
                    }
                    Err(err)
                }
            },
        }
    }

    /// Cancels a scheduled appointment, then refunds a charged payment or voids an
    /// authorization. Money failures are reported in the outcome; the appointment stays cancelled.
    pub async fn cancel_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> PaymentResult<CancellationOutcome> {
        let appointment = self.load_owned_appointment(user_id, appointment_id).await?;
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(PaymentError::PreconditionFailed(format!(
                "only scheduled appointments can be cancelled; appointment is {}",
                appointment.status
            )));
        }

        let cancelled = self
            .appointment_repo
            .transition_status(
                appointment_id,
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
            )
            .await?;
        if !cancelled {
            return Err(PaymentError::PreconditionFailed(
                "appointment is no longer scheduled".to_string(),
            ));
        }

        let payments = self.appointment_payments(appointment_id).await?;
        let resolution = if payments.iter().any(|p| p.status == PaymentStatus::Charged) {
            match self.refund(appointment_id, None).await {
                Ok(amount_minor) => PaymentResolution::Refunded { amount_minor },
                Err(err) => {
                    error!(%appointment_id, error = %err, "payments: refund on cancellation failed");
                    PaymentResolution::RefundFailed {
                        reason: err.public_message(),
                    }
                }
            }
        } else if let Some(payment) = payments
            .iter()
            .find(|p| p.status == PaymentStatus::Authorized)
        {
            match self.void_authorization(payment).await {
                Ok(()) => PaymentResolution::Voided,
                Err(err) => {
                    error!(%appointment_id, error = %err, "payments: void on cancellation failed");
                    PaymentResolution::VoidFailed {
                        reason: err.public_message(),
                    }
                }
            }
        } else {
            PaymentResolution::NoPayment
        };

        info!(%user_id, %appointment_id, resolution = ?resolution, "payments: appointment cancelled");

        self.notify(
            user_id,
            NotificationEvent::AppointmentCancelled,
            json!({
                "appointment_id": appointment_id,
                "scheduled_at": appointment.scheduled_at,
                "payment": resolution,
            }),
        )
        .await;

        Ok(CancellationOutcome {
            appointment_id,
            status: AppointmentStatus::Cancelled,
            payment: resolution,
        })
    }

    pub async fn capture_due(&self, lead_time: Duration) -> PaymentResult<CaptureSweepResult> {
        self.capture_due_at(Utc::now(), lead_time).await
    }

    /// Captures every authorized appointment starting within `lead_time` of `now`.
    /// Per-appointment failures are collected, not propagated.
    pub async fn capture_due_at(
        &self,
        now: DateTime<Utc>,
        lead_time: Duration,
    ) -> PaymentResult<CaptureSweepResult> {
        let horizon = now
            .checked_add_signed(lead_time.max(Duration::zero()))
            .ok_or_else(|| PaymentError::InvalidInput("capture lead time is out of range".to_string()))?;
        let due = self.appointment_repo.list_due_for_capture(horizon).await?;

        let mut result = CaptureSweepResult {
            scanned: due.len(),
            ..Default::default()
        };

        for appointment in due {
            match self.capture(appointment.id).await {
                Ok(_) => {
                    result.captured += 1;
                    result.captured_ids.push(appointment.id);
                }
                Err(err) => {
                    warn!(
                        appointment_id = %appointment.id,
                        error = %err,
                        "payments: scheduled capture failed"
                    );
                    result.failed += 1;
                    result.failures.push(CaptureFailure {
                        appointment_id: appointment.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            scanned = result.scanned,
            captured = result.captured,
            failed = result.failed,
            %horizon,
            "payments: capture sweep completed"
        );

        Ok(result)
    }

    /// All payment rows for the appointment. `requester` scopes the lookup to the owner;
    /// operators pass `None`.
    pub async fn list_appointment_payments(
        &self,
        requester: Option<Uuid>,
        appointment_id: Uuid,
    ) -> PaymentResult<Vec<PaymentEntity>> {
        match requester {
            Some(user_id) => self.load_owned_appointment(user_id, appointment_id).await?,
            None => self.load_appointment(appointment_id).await?,
        };

        Ok(self.payment_repo.list_by_appointment(appointment_id).await?)
    }

    async fn void_authorization(&self, payment: &PaymentEntity) -> PaymentResult<()> {
        let intent_id = payment.provider_intent_id.clone().ok_or_else(|| {
            PaymentError::PreconditionFailed("authorized payment has no processor intent".to_string())
        })?;

        let voided = self
            .gateway
            .cancel_intent(&intent_id, &operation_key(payment, "void"))
            .await
            .map_err(|err| PaymentError::ExternalProcessor(err.to_string()))?;
        if voided.status != ProcessorIntentStatus::Canceled {
            return Err(PaymentError::ExternalProcessor(format!(
                "void ended in status {}",
                voided.status.as_str()
            )));
        }

        self.persist_after_money_moved(
            payment,
            &intent_id,
            PaymentStatus::Authorized,
            PaymentTransition::Voided,
            "void",
        )
        .await?;
        self.set_payment_status_after_money_moved(
            payment,
            &intent_id,
            AppointmentPaymentStatus::Voided,
            "void",
        )
        .await?;

        info!(
            appointment_id = %payment.appointment_id,
            payment_id = %payment.id,
            %intent_id,
            "payments: authorization voided"
        );
        Ok(())
    }

    async fn release_unpaid_booking(&self, appointment_id: Uuid) {
        match self
            .appointment_repo
            .transition_status(
                appointment_id,
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
            )
            .await
        {
            Ok(_) => info!(%appointment_id, "payments: booking cancelled after failed payment setup"),
            Err(err) => error!(
                %appointment_id,
                db_error = ?err,
                "payments: failed to cancel booking after failed payment setup"
            ),
        }
    }

    pub(crate) async fn load_appointment(&self, appointment_id: Uuid) -> PaymentResult<AppointmentEntity> {
        self.appointment_repo
            .find_by_id(appointment_id)
            .await
            .map_err(|err| {
                error!(%appointment_id, db_error = ?err, "payments: failed to load appointment");
                PaymentError::Internal(err)
            })?
            .ok_or(PaymentError::NotFound("appointment"))
    }

    async fn load_owned_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> PaymentResult<AppointmentEntity> {
        let appointment = self.load_appointment(appointment_id).await?;
        if appointment.user_id != user_id {
            return Err(PaymentError::NotFound("appointment"));
        }
        Ok(appointment)
    }

    async fn appointment_payments(&self, appointment_id: Uuid) -> PaymentResult<Vec<PaymentEntity>> {
        let payments = self.payment_repo.list_by_appointment(appointment_id).await?;
        Ok(payments
            .into_iter()
            .filter(|p| p.payment_type == PaymentType::Appointment)
            .collect())
    }

    /// Inserts the pending row for the next attempt. The key only advances once an attempt has
    /// failed, so a concurrent caller derives the same key and gets `PreconditionFailed`.
    async fn claim_payment(
        &self,
        appointment: &AppointmentEntity,
        amount_minor: i64,
        payment_type: PaymentType,
    ) -> PaymentResult<PaymentEntity> {
        let attempt = self
            .payment_repo
            .count_failed_attempts(appointment.id, payment_type)
            .await?;
        let idempotency_key = payment_idempotency_key(payment_type, appointment.id, attempt);

        self.payment_repo
            .insert_pending(InsertPaymentEntity::pending(
                appointment.id,
                appointment.user_id,
                amount_minor,
                payment_type,
                idempotency_key,
            ))
            .await?
            .ok_or_else(|| {
                PaymentError::PreconditionFailed(format!(
                    "a {payment_type} payment for this appointment is already in progress"
                ))
            })
    }

    async fn authorization_failed(&self, payment: &PaymentEntity, reason: String) -> PaymentError {
        warn!(
            appointment_id = %payment.appointment_id,
            payment_id = %payment.id,
            reason = %reason,
            "payments: authorization failed"
        );
        self.fail_payment(payment, PaymentStatus::Pending, &reason).await;

        if let Err(err) = self
            .appointment_repo
            .update_payment_status(payment.appointment_id, AppointmentPaymentStatus::Failed)
            .await
        {
            error!(
                appointment_id = %payment.appointment_id,
                db_error = ?err,
                "payments: failed to mark appointment payment failed"
            );
        }

        PaymentError::ExternalProcessor(reason)
    }

    async fn fail_payment(&self, payment: &PaymentEntity, from: PaymentStatus, reason: &str) {
        let transition = PaymentTransition::Failed {
            reason: reason.to_string(),
        };
        match self.payment_repo.apply_transition(payment.id, from, transition).await {
            Ok(true) => {}
            Ok(false) => warn!(
                payment_id = %payment.id,
                from = %from,
                "payments: payment changed status before it could be marked failed"
            ),
            Err(err) => error!(
                payment_id = %payment.id,
                db_error = ?err,
                "payments: failed to mark payment failed"
            ),
        }
    }

    async fn persist_after_money_moved(
        &self,
        payment: &PaymentEntity,
        intent_id: &str,
        from: PaymentStatus,
        transition: PaymentTransition,
        context: &'static str,
    ) -> PaymentResult<()> {
        match self.payment_repo.apply_transition(payment.id, from, transition).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(reconciliation_error(
                payment,
                intent_id,
                context,
                &anyhow::anyhow!("payment was no longer {from}"),
            )),
            Err(err) => Err(reconciliation_error(payment, intent_id, context, &err)),
        }
    }

    async fn set_payment_status_after_money_moved(
        &self,
        payment: &PaymentEntity,
        intent_id: &str,
        payment_status: AppointmentPaymentStatus,
        context: &'static str,
    ) -> PaymentResult<()> {
        self.appointment_repo
            .update_payment_status(payment.appointment_id, payment_status)
            .await
            .map_err(|err| reconciliation_error(payment, intent_id, context, &err))
    }

    async fn notify(&self, user_id: Uuid, event: NotificationEvent, payload: serde_json::Value) {
        if let Err(err) = self.notifier.notify(user_id, event, payload).await {
            warn!(%user_id, event = %event, error = ?err, "payments: notification failed");
        }
    }
}

/// Money moved at the processor but the local record did not follow. Logged for the ops
/// alert webhook and surfaced to the caller.
fn reconciliation_error(
    payment: &PaymentEntity,
    intent_id: &str,
    context: &'static str,
    err: &anyhow::Error,
) -> PaymentError {
    error!(
        reconciliation = true,
        appointment_id = %payment.appointment_id,
        payment_id = %payment.id,
        payment_type = %payment.payment_type,
        intent_id,
        amount_minor = payment.amount_minor,
        context,
        db_error = ?err,
        "payments: processor succeeded but the local record was not updated"
    );
    PaymentError::Persistence {
        context,
        intent_id: intent_id.to_string(),
    }
}

fn operation_key(payment: &PaymentEntity, operation: &str) -> String {
    format!("{}:{operation}", payment.idempotency_key)
}

fn intent_metadata(payment: &PaymentEntity) -> HashMap<String, String> {
    HashMap::from([
        ("appointment_id".to_string(), payment.appointment_id.to_string()),
        ("payment_id".to_string(), payment.id.to_string()),
        ("user_id".to_string(), payment.user_id.to_string()),
        ("payment_type".to_string(), payment.payment_type.to_string()),
    ])
}
