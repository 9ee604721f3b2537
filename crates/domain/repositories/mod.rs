pub mod appointments;
pub mod notifications;
pub mod payment_gateway;
pub mod payment_methods;
pub mod payments;
