pub mod api;
pub mod bootstrap;
pub mod catalog;
pub mod health;
pub mod pdf;
pub mod telemetry;
