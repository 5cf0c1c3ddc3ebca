//! API middleware.
//!
//! Protected routes run behind `auth::require_auth`; everything runs
//! behind the trace and CORS layers added by the router.

pub mod auth;
