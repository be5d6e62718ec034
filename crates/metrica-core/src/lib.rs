//! Metrica Core
//!
//! Core domain types, traits, and error handling for Metrica.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates.

pub mod calendar;
pub mod context;
pub mod error;
pub mod output;
pub mod ports;
pub mod ratelimit;
pub mod request;

pub use error::{Error, ErrorCategory, Result};
pub use request::{Login, QueryParams, RequestKey};
