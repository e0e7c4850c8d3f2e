pub mod account;
pub mod billing_session;
pub mod reconciliation;
pub mod reconciliation_runner;
pub mod webhook;
