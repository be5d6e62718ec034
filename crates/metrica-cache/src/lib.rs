//! In-process response cache and request coalescing for Metrica.
//!
//! Both structures are process-wide singletons shared through `Arc` by the
//! HTTP layer. Nothing here is persisted; a restart starts from empty.

pub mod coalesce;
pub mod response;
pub mod types;

pub use coalesce::{Admission, PendingGuard, RequestCoalescer};
pub use response::ResponseCache;
pub use types::{CacheEntry, CacheStats};
