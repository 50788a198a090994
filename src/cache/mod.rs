//! Caching module
//!
//! Session-scoped memoization of the most recent training run.

mod session;

pub use session::{CacheStats, RunKey, SessionCache};
