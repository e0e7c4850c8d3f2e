pub mod account;
pub mod plan;
pub mod reconciliation_run;
pub mod subscription;
