//! # recency
//!
//! Fixed-capacity key/value cache with Least Recently Used eviction.
//!
//! ## Architecture
//! - **HashMap**: AHash index from key to arena slot (O(1))
//! - **LRU List**: doubly-linked list threaded through the arena by index,
//!   least recently used at the head, most recently used at the tail
//! - **Ownership**: the cache owns every entry; neighbour links are plain
//!   indices, so dropping the cache releases everything
//!
//! The cache is single-owner. Hosts that share it across threads wrap it in
//! their own lock.

#![warn(missing_docs)]

mod error;
mod lru;
mod stats;

pub use error::{Error, Result};
pub use lru::{EntryDetail, Iter, LruCache};
pub use stats::CacheStats;
