pub mod billing_service;
pub mod payment_gateway;
