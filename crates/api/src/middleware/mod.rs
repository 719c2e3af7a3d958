//! Request middleware.

pub mod auth;

pub use auth::{AuthAccount, account_middleware};
