pub mod booking;
pub mod enums;
pub mod money;
pub mod no_show;
pub mod payment_intents;
