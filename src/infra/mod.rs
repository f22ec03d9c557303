pub mod app;
pub mod billing_client;
pub mod config;
pub mod db;
pub mod gateway_client;
pub mod setup;
pub mod sweep_worker;
pub mod webhook_verifier;
