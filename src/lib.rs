pub mod aggregate;
pub mod classify;
pub mod errors;
pub mod host;
pub mod lifecycle;
pub mod orchestrator;
pub mod patch;
pub mod policy;
pub mod report;
pub mod review_config;
pub mod ui;
