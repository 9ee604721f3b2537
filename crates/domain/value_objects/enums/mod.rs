pub mod appointment_payment_statuses;
pub mod appointment_statuses;
pub mod appointment_types;
pub mod notification_events;
pub mod payment_statuses;
pub mod payment_types;
