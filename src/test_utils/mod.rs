//! Test utilities for integration testing.
//!
//! This module provides:
//! - An in-memory store implementing the persistence traits
//! - Mock clients for the payment gateway and billing service
//! - A builder for constructing `AppState` with test dependencies

pub mod app_state_builder;
pub mod client_mocks;
mod store_mocks;

pub use store_mocks::*;

use axum_test::TestServer;

use crate::adapters::http::app_state::AppState;
use crate::infra::app::create_app;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

pub fn test_server(app_state: AppState) -> TestServer {
    TestServer::new(create_app(app_state)).expect("failed to start test server")
}
