//! API endpoint handlers.
//!
//! Each module corresponds to a screen or feature. Handlers delegate to
//! the domain modules and only translate errors.

pub mod auth;
pub mod health;
pub mod journal;
pub mod picker;
pub mod reports;
pub mod service;
