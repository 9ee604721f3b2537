pub mod appointments;
pub mod no_shows;
pub mod payment_methods;
pub mod payments;
