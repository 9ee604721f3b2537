use std::sync::Arc;

use anyhow::Result;
use practice_payments::{
    domain::{
        repositories::{
            appointments::AppointmentRepository, notifications::NotificationDispatcher,
            payment_gateway::PaymentGateway, payment_methods::PaymentMethodRepository,
            payments::PaymentRepository,
        },
        value_objects::booking::BookingPolicy,
    },
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                appointments::AppointmentPostgres, payment_methods::PaymentMethodPostgres,
                payments::PaymentPostgres,
            },
        },
        notifications::webhook::{LogOnlyNotificationDispatcher, WebhookNotificationDispatcher},
    },
    payments::stripe_client::StripeClient,
};
use tracing::{info, warn};

use crate::{
    config::config_model::{Notifications, Stripe},
    usecases::{
        no_show::NoShowUseCase, payment_lifecycle::PaymentLifecycleUseCase,
        payment_methods::PaymentMethodUseCase,
    },
};

#[derive(Clone)]
pub struct UseCases {
    pub payments: Arc<PaymentLifecycleUseCase>,
    pub no_shows: Arc<NoShowUseCase>,
    pub payment_methods: Arc<PaymentMethodUseCase>,
}

pub fn build_usecases(
    db_pool: Arc<PgPoolSquad>,
    stripe: &Stripe,
    notifications: &Notifications,
    booking_policy: BookingPolicy,
) -> Result<UseCases> {
    let appointment_repo: Arc<dyn AppointmentRepository + Send + Sync> =
        Arc::new(AppointmentPostgres::new(Arc::clone(&db_pool)));
    let payment_repo: Arc<dyn PaymentRepository + Send + Sync> =
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
    let payment_method_repo: Arc<dyn PaymentMethodRepository + Send + Sync> =
        Arc::new(PaymentMethodPostgres::new(Arc::clone(&db_pool)));

    let gateway: Arc<dyn PaymentGateway + Send + Sync> =
        Arc::new(StripeClient::new(stripe.secret_key.clone(), stripe.timeout)?);

    let notifier: Arc<dyn NotificationDispatcher + Send + Sync> = match &notifications.webhook_url
    {
        Some(url) => {
            info!(host = url.host_str().unwrap_or_default(), "notifications: webhook enabled");
            Arc::new(WebhookNotificationDispatcher::new(
                url.clone(),
                notifications.timeout,
            )?)
        }
        None => {
            warn!("notifications: NOTIFICATION_WEBHOOK_URL not set; events are only logged");
            Arc::new(LogOnlyNotificationDispatcher)
        }
    };

    let payments = Arc::new(PaymentLifecycleUseCase::new(
        Arc::clone(&appointment_repo),
        payment_repo,
        Arc::clone(&payment_method_repo),
        gateway,
        Arc::clone(&notifier),
        booking_policy,
    ));

    let no_shows = Arc::new(NoShowUseCase::new(
        appointment_repo,
        Arc::clone(&payments),
        notifier,
    ));

    let payment_methods = Arc::new(PaymentMethodUseCase::new(payment_method_repo));

    Ok(UseCases {
        payments,
        no_shows,
        payment_methods,
    })
}
