pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod store;
pub mod telemetry;
pub mod workflows;
