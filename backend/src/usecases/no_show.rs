use std::sync::Arc;

use chrono::{DateTime, Utc};
use practice_payments::domain::{
    entities::appointments::AppointmentEntity,
    repositories::{appointments::AppointmentRepository, notifications::NotificationDispatcher},
    value_objects::{
        enums::{appointment_statuses::AppointmentStatus, notification_events::NotificationEvent},
        money::{format_minor_units, to_minor_units},
        no_show::NoShowPolicy,
    },
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    payment_errors::{PaymentError, PaymentResult},
    payment_lifecycle::PaymentLifecycleUseCase,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "fee", rename_all = "snake_case")]
pub enum NoShowFeeOutcome {
    FeeCharged { payment_id: Uuid, amount_minor: i64 },
    FeeFailed { reason: String },
    /// Marked without charging; left for an operator.
    Flagged,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoShowOutcome {
    pub appointment_id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub fee: NoShowFeeOutcome,
    pub notified: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoShowScanResult {
    pub scanned: usize,
    pub processed_count: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<NoShowOutcome>,
}

pub struct NoShowUseCase {
    appointment_repo: Arc<dyn AppointmentRepository + Send + Sync>,
    payments: Arc<PaymentLifecycleUseCase>,
    notifier: Arc<dyn NotificationDispatcher + Send + Sync>,
}

impl NoShowUseCase {
    pub fn new(
        appointment_repo: Arc<dyn AppointmentRepository + Send + Sync>,
        payments: Arc<PaymentLifecycleUseCase>,
        notifier: Arc<dyn NotificationDispatcher + Send + Sync>,
    ) -> Self {
        Self {
            appointment_repo,
            payments,
            notifier,
        }
    }

    pub async fn scan_and_process(&self, policy: NoShowPolicy) -> PaymentResult<NoShowScanResult> {
        self.scan_and_process_at(policy, Utc::now()).await
    }

    pub async fn scan_and_process_at(
        &self,
        policy: NoShowPolicy,
        now: DateTime<Utc>,
    ) -> PaymentResult<NoShowScanResult> {
        let candidates = self
            .appointment_repo
            .list_overdue_scheduled(policy.cutoff(now))
            .await
            .map_err(|err| {
                error!(db_error = ?err, "no_show: failed to list overdue appointments");
                PaymentError::Internal(err)
            })?;

        let mut result = NoShowScanResult {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            // The list is a snapshot; the appointment may have been cancelled or completed since.
            let current = match self.appointment_repo.find_by_id(candidate.id).await {
                Ok(Some(current)) if policy.is_overdue(&current, now) => current,
                Ok(_) => {
                    result.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(appointment_id = %candidate.id, db_error = ?err, "no_show: failed to re-read appointment");
                    result.failed += 1;
                    continue;
                }
            };

            match self.mark_scheduled(&current).await {
                Ok(true) => {}
                Ok(false) => {
                    result.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(appointment_id = %current.id, db_error = ?err, "no_show: failed to mark appointment");
                    result.failed += 1;
                    continue;
                }
            }

            let fee_amount = policy.auto_process.then_some(policy.fee_amount);
            let outcome = self.settle(&current, fee_amount).await;
            result.processed_count += 1;
            result.results.push(outcome);
        }

        info!(
            scanned = result.scanned,
            processed = result.processed_count,
            skipped = result.skipped,
            failed = result.failed,
            window_minutes = policy.window_minutes,
            auto_process = policy.auto_process,
            "no_show: scan completed"
        );

        Ok(result)
    }

    /// Marks one appointment as a no-show regardless of the time window. An appointment already
    /// marked `no_show` without a fee may still have its fee charged.
    pub async fn mark_manually(
        &self,
        appointment_id: Uuid,
        should_charge_fee: bool,
        fee_amount: f64,
    ) -> PaymentResult<NoShowOutcome> {
        if should_charge_fee && to_minor_units(fee_amount).is_none() {
            return Err(PaymentError::InvalidAmount);
        }

        let appointment = self.payments.load_appointment(appointment_id).await?;

        match appointment.status {
            AppointmentStatus::Scheduled => {
                if !self.mark_scheduled(&appointment).await? {
                    return Err(PaymentError::PreconditionFailed(
                        "appointment is no longer scheduled".to_string(),
                    ));
                }
            }
            AppointmentStatus::NoShow if should_charge_fee && !appointment.no_show_fee_charged => {}
            status => {
                return Err(PaymentError::PreconditionFailed(format!(
                    "appointment is {status}"
                )));
            }
        }

        let fee_amount = should_charge_fee.then_some(fee_amount);
        Ok(self.settle(&appointment, fee_amount).await)
    }

    async fn mark_scheduled(&self, appointment: &AppointmentEntity) -> anyhow::Result<bool> {
        let marked = self
            .appointment_repo
            .transition_status(
                appointment.id,
                AppointmentStatus::Scheduled,
                AppointmentStatus::NoShow,
            )
            .await?;

        if marked {
            info!(
                appointment_id = %appointment.id,
                user_id = %appointment.user_id,
                scheduled_at = %appointment.scheduled_at,
                "no_show: appointment marked no_show"
            );
        }
        Ok(marked)
    }

    /// Charges the fee when `fee_amount` is set, then notifies the user whatever the outcome.
    async fn settle(&self, appointment: &AppointmentEntity, fee_amount: Option<f64>) -> NoShowOutcome {
        let fee = match fee_amount {
            Some(amount) => match self.payments.charge_fee(appointment.id, amount).await {
                Ok(payment) => NoShowFeeOutcome::FeeCharged {
                    payment_id: payment.id,
                    amount_minor: payment.amount_minor,
                },
                Err(err) => {
                    warn!(
                        appointment_id = %appointment.id,
                        error = %err,
                        "no_show: fee charge failed"
                    );
                    NoShowFeeOutcome::FeeFailed {
                        reason: err.to_string(),
                    }
                }
            },
            None => NoShowFeeOutcome::Flagged,
        };

        let fee_charged = match &fee {
            NoShowFeeOutcome::FeeCharged { amount_minor, .. } => {
                Some(format_minor_units(*amount_minor))
            }
            _ => None,
        };
        let payload = json!({
            "appointment_id": appointment.id,
            "scheduled_at": appointment.scheduled_at,
            "fee_charged": fee_charged,
        });

        let notified = match self
            .notifier
            .notify(appointment.user_id, NotificationEvent::NoShowRecorded, payload)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    appointment_id = %appointment.id,
                    user_id = %appointment.user_id,
                    error = ?err,
                    "no_show: notification failed"
                );
                false
            }
        };

        NoShowOutcome {
            appointment_id: appointment.id,
            user_id: appointment.user_id,
            fee,
            notified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::InMemoryStore;
    use anyhow::anyhow;
    use chrono::{Duration, TimeZone};
    use mockall::predicate::eq;
    use practice_payments::domain::{
        repositories::{
            appointments::MockAppointmentRepository, notifications::MockNotificationDispatcher,
            payment_gateway::MockPaymentGateway,
            payment_methods::{MockPaymentMethodRepository, PaymentMethodRepository},
            payments::{MockPaymentRepository, PaymentRepository},
        },
        value_objects::{
            booking::BookingPolicy,
            enums::{
                appointment_types::AppointmentType, payment_statuses::PaymentStatus,
                payment_types::PaymentType,
            },
            payment_intents::{CaptureMode, ProcessorIntent, ProcessorIntentStatus},
        },
    };

    fn build(
        store: &Arc<InMemoryStore>,
        gateway: MockPaymentGateway,
        notifier: MockNotificationDispatcher,
    ) -> NoShowUseCase {
        let mut lifecycle_notifier = MockNotificationDispatcher::new();
        lifecycle_notifier.expect_notify().returning(|_, _, _| Ok(()));

        let lifecycle = PaymentLifecycleUseCase::new(
            Arc::clone(store) as Arc<dyn AppointmentRepository + Send + Sync>,
            Arc::clone(store) as Arc<dyn PaymentRepository + Send + Sync>,
            Arc::clone(store) as Arc<dyn PaymentMethodRepository + Send + Sync>,
            Arc::new(gateway),
            Arc::new(lifecycle_notifier),
            BookingPolicy::Optimistic,
        );

        NoShowUseCase::new(
            Arc::clone(store) as Arc<dyn AppointmentRepository + Send + Sync>,
            Arc::new(lifecycle),
            Arc::new(notifier),
        )
    }

    fn notifier_expecting(times: usize) -> MockNotificationDispatcher {
        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_notify()
            .withf(|_, event, _| *event == NotificationEvent::NoShowRecorded)
            .times(times)
            .returning(|_, _, _| Ok(()));
        notifier
    }

    #[tokio::test]
    async fn missed_session_is_marked_and_charged_twenty_minutes_later() {
        let store = Arc::new(InMemoryStore::default());
        let user_id = Uuid::new_v4();
        let session = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appointment = store.seed_appointment(user_id, session, AppointmentStatus::Scheduled);
        store.seed_default_method(user_id);

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_intent()
            .withf(|request| {
                request.amount_minor == 5_000
                    && request.capture_mode == CaptureMode::Automatic
                    && request.off_session
            })
            .times(1)
            .returning(|request| {
                Ok(ProcessorIntent {
                    id: "pi_fee".to_string(),
                    status: ProcessorIntentStatus::Succeeded,
                    amount_minor: request.amount_minor,
                    failure_message: None,
                })
            });

        let usecase = build(&store, gateway, notifier_expecting(1));
        let result = usecase
            .scan_and_process_at(NoShowPolicy::default(), session + Duration::minutes(20))
            .await
            .unwrap();

        assert_eq!(result.processed_count, 1);
        assert!(matches!(
            result.results[0].fee,
            NoShowFeeOutcome::FeeCharged { amount_minor: 5_000, .. }
        ));
        assert!(result.results[0].notified);

        let appointment = store.appointment(appointment.id);
        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        assert!(appointment.no_show_fee_charged);
        let fees: Vec<_> = store
            .payments_for(appointment.id)
            .into_iter()
            .filter(|p| p.payment_type == PaymentType::NoShowFee)
            .collect();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].status, PaymentStatus::Charged);
    }

    #[tokio::test]
    async fn user_is_notified_even_when_the_fee_cannot_be_charged() {
        let store = Arc::new(InMemoryStore::default());
        let session = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        let appointment =
            store.seed_appointment(Uuid::new_v4(), session, AppointmentStatus::Scheduled);

        let usecase = build(&store, MockPaymentGateway::new(), notifier_expecting(1));
        let result = usecase
            .scan_and_process_at(NoShowPolicy::default(), session + Duration::minutes(20))
            .await
            .unwrap();

        assert_eq!(result.processed_count, 1);
        assert!(matches!(
            &result.results[0].fee,
            NoShowFeeOutcome::FeeFailed { reason } if reason.contains("payment method")
        ));
        let appointment = store.appointment(appointment.id);
        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        assert!(!appointment.no_show_fee_charged);
    }

    #[tokio::test]
    async fn scan_only_selects_scheduled_appointments_past_the_window() {
        let store = Arc::new(InMemoryStore::default());
        let now = Utc::now();
        let overdue =
            store.seed_appointment(Uuid::new_v4(), now - Duration::minutes(20), AppointmentStatus::Scheduled);
        let within_window =
            store.seed_appointment(Uuid::new_v4(), now - Duration::minutes(10), AppointmentStatus::Scheduled);
        let cancelled =
            store.seed_appointment(Uuid::new_v4(), now - Duration::minutes(20), AppointmentStatus::Cancelled);

        let policy = NoShowPolicy {
            auto_process: false,
            ..NoShowPolicy::default()
        };
        let usecase = build(&store, MockPaymentGateway::new(), notifier_expecting(1));
        let result = usecase.scan_and_process_at(policy, now).await.unwrap();

        assert_eq!(result.processed_count, 1);
        assert_eq!(result.results[0].appointment_id, overdue.id);
        assert_eq!(result.results[0].fee, NoShowFeeOutcome::Flagged);
        assert_eq!(store.appointment(overdue.id).status, AppointmentStatus::NoShow);
        assert_eq!(store.appointment(within_window.id).status, AppointmentStatus::Scheduled);
        assert_eq!(store.appointment(cancelled.id).status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn scan_skips_appointments_cancelled_after_the_snapshot() {
        let now = Utc::now();
        let snapshot = AppointmentEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            appointment_type: AppointmentType::Therapy,
            scheduled_at: now - Duration::minutes(40),
            end_at: None,
            status: AppointmentStatus::Scheduled,
            payment_status: Default::default(),
            no_show_fee_charged: false,
            created_at: now,
            updated_at: now,
        };
        let cancelled = AppointmentEntity {
            status: AppointmentStatus::Cancelled,
            ..snapshot.clone()
        };

        let mut appointment_repo = MockAppointmentRepository::new();
        appointment_repo
            .expect_list_overdue_scheduled()
            .returning(move |_| Ok(vec![snapshot.clone()]));
        appointment_repo
            .expect_find_by_id()
            .with(eq(cancelled.id))
            .returning(move |_| Ok(Some(cancelled.clone())));
        appointment_repo.expect_transition_status().times(0);
        let appointment_repo = Arc::new(appointment_repo);

        let lifecycle = PaymentLifecycleUseCase::new(
            Arc::clone(&appointment_repo) as Arc<dyn AppointmentRepository + Send + Sync>,
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockPaymentMethodRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            Arc::new(MockNotificationDispatcher::new()),
            BookingPolicy::Optimistic,
        );
        let usecase = NoShowUseCase::new(
            appointment_repo,
            Arc::new(lifecycle),
            Arc::new(MockNotificationDispatcher::new()),
        );

        let result = usecase
            .scan_and_process_at(NoShowPolicy::default(), now)
            .await
            .unwrap();

        assert_eq!(result.scanned, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.processed_count, 0);
    }

    #[tokio::test]
    async fn one_failing_item_does_not_abort_the_batch() {
        let store = Arc::new(InMemoryStore::default());
        let now = Utc::now();
        let first =
            store.seed_appointment(Uuid::new_v4(), now - Duration::hours(2), AppointmentStatus::Scheduled);
        let second =
            store.seed_appointment(Uuid::new_v4(), now - Duration::hours(1), AppointmentStatus::Scheduled);

        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_notify()
            .times(2)
            .returning(move |user_id, _, _| {
                if user_id == first.user_id {
                    Err(anyhow!("mailer unavailable"))
                } else {
                    Ok(())
                }
            });

        let policy = NoShowPolicy {
            auto_process: false,
            ..NoShowPolicy::default()
        };
        let result = build(&store, MockPaymentGateway::new(), notifier)
            .scan_and_process_at(policy, now)
            .await
            .unwrap();

        assert_eq!(result.processed_count, 2);
        assert!(!result.results[0].notified);
        assert!(result.results[1].notified);
        assert_eq!(store.appointment(second.id).status, AppointmentStatus::NoShow);
    }

    #[tokio::test]
    async fn manual_marking_bypasses_the_window() {
        let store = Arc::new(InMemoryStore::default());
        let appointment = store.seed_appointment(
            Uuid::new_v4(),
            Utc::now() + Duration::hours(1),
            AppointmentStatus::Scheduled,
        );

        let outcome = build(&store, MockPaymentGateway::new(), notifier_expecting(1))
            .mark_manually(appointment.id, false, 50.0)
            .await
            .unwrap();

        assert_eq!(outcome.fee, NoShowFeeOutcome::Flagged);
        assert_eq!(store.appointment(appointment.id).status, AppointmentStatus::NoShow);
    }

    #[tokio::test]
    async fn manual_marking_rejects_terminal_appointments() {
        let store = Arc::new(InMemoryStore::default());
        let completed = store.seed_appointment(
            Uuid::new_v4(),
            Utc::now() - Duration::days(1),
            AppointmentStatus::Completed,
        );

        let result = build(&store, MockPaymentGateway::new(), MockNotificationDispatcher::new())
            .mark_manually(completed.id, true, 50.0)
            .await;

        assert!(matches!(result, Err(PaymentError::PreconditionFailed(_))));
        assert_eq!(store.appointment(completed.id).status, AppointmentStatus::Completed);
    }
}
