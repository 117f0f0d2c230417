//! spool-axum: Axum adapter for spool upload jobs.
//!
//! Maps each [`JobService`](spool_jobs::JobService) operation onto one
//! route under `/api/jobs` and turns job errors into JSON error bodies.

pub mod app;
pub mod rest;
pub mod state;
mod error;
pub use error::{status_for, SpoolAxumError};
pub use state::SpoolAxumState;

pub use app::{axum, SpoolApp, DEFAULT_BODY_LIMIT};
