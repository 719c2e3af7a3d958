//! Shared errors and configuration for the wallet service.
//!
//! This crate provides what every other crate and binary needs:
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::AppError;
