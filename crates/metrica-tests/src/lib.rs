//! Integration test infrastructure for Metrica.
//!
//! Starts the real router on an ephemeral port, backed by a scripted
//! upstream that counts and optionally slows down every call.
//!
//! # Usage
//!
//! ```ignore
//! use metrica_tests::{ApiTestClient, ScriptedUpstream, build_state, settings, start_test_server};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let upstream = Arc::new(ScriptedUpstream::new());
//!     let (addr, _handle) = start_test_server(build_state(settings(), upstream)).await.unwrap();
//!     let client = ApiTestClient::new(addr);
//! }
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,metrica_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
