//! GitHub upstream adapter for Metrica.
//!
//! Implements [`metrica_core::ports::UpstreamApi`] over HTTP, recognizes the
//! provider's error shapes, tracks the quota counters in the background and
//! offers a deterministic offline stand-in.

pub mod client;
pub mod errors;
pub mod mocked;
pub mod ratelimit;

pub use client::GitHubClient;
pub use mocked::MockedUpstream;
pub use ratelimit::RateLimitTracker;
