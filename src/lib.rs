pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(feature = "api")]
pub mod api;
pub mod config;
