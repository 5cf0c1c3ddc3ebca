//! HTTP API.
//!
//! Exposes the picker, accounts, the daily health log, and medical
//! reports as JSON endpoints under `/api/`. Protected routes require a
//! session token issued by sign-in or sign-up.
//!
//! The router is composable: `api_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ApiServerInfo};
pub use types::ApiContext;
