pub mod cloud_admin;
pub mod notifier;
pub mod payment_processor;
