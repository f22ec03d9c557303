pub mod app_error;
pub mod normalizer;
pub mod ports;
pub mod use_cases;
