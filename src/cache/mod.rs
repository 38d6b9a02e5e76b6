//! Memoization of LLM generations.
//!
//! A cache maps a [`CacheKey`], the fingerprint of a model configuration plus
//! a prompt, to the generations previously computed for it. Two calls with
//! the same configuration, stop sequences and prompt text share an entry.
//!
//! The cache is an explicit object: build it once at start-up and hand the
//! same `Arc<dyn Cache>` to every orchestrator that should share it.
//!
//! ```rust
//! use forgechain::cache::{Cache, InMemoryCache};
//! use std::sync::Arc;
//!
//! let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
//! ```

pub mod file;
pub mod key;
pub mod memory;

pub use file::{CacheError, FileCache};
pub use key::{CacheKey, llm_string};
pub use memory::InMemoryCache;

use crate::llm::Generation;
use async_trait::async_trait;

/// Storage for memoized generations.
///
/// Neither operation can fail: a miss is `None`, and a backend that cannot
/// persist an update must log the problem and carry on.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the generations stored under `key`, if any.
    async fn lookup(&self, key: &CacheKey) -> Option<Vec<Generation>>;

    /// Stores `value` under `key`.
    async fn update(&self, key: CacheKey, value: Vec<Generation>);
}
