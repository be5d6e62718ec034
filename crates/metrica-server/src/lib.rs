//! Metrica server: configuration and application assembly.

pub mod app;
pub mod config;

pub use app::{Application, build};
pub use config::ServerConfig;
