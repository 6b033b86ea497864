//! LLM response caching with bounded size and LRU eviction.

pub mod recency;
pub mod response_cache;

pub use recency::RecencyCache;
pub use response_cache::{CacheStats, ResponseCache};
