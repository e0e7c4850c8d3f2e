//! Test utilities for unit and HTTP-level testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - Recording fakes for Stripe, the cloud admin API and the notifier
//! - A builder for constructing `AppState` with test dependencies

mod app_state_builder;
mod factories;
mod provider_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use persistence_mocks::*;
pub use provider_mocks::*;
