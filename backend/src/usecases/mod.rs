pub mod no_show;
pub mod payment_errors;
pub mod payment_lifecycle;
pub mod payment_methods;

#[cfg(test)]
pub(crate) mod test_support;
