pub mod appointments;
pub mod payment_methods;
pub mod payments;
