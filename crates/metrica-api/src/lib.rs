//! HTTP API server for Metrica.
//!
//! `GET /{login}` and `GET /{login}/{repository}` render metrics images;
//! `GET /.requests` reports the remaining provider quota.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppSettings, AppState};
