pub mod app;
pub mod communication;
pub mod embedded;
pub mod error;
pub mod logging;
pub mod schedule;
