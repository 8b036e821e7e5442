//! Network-first offline cache.
//!
//! [`OfflineCache`] plays the part of a service worker: it pre-fetches a
//! [`Manifest`] into the current cache generation, answers every request from
//! the network when it can and from storage when it cannot, and prunes stale
//! generations on activation. Storage is pluggable through [`CacheStorage`].

mod entry;
pub mod error;
mod key;
mod manifest;
mod storage;
mod worker;

pub use crate::entry::CacheEntry;
pub use crate::key::CacheKey;
pub use crate::key::validate as validate_generation;
pub use crate::manifest::Manifest;
pub use crate::storage::{CacheStorage, LocalStorage, MemoryStorage};
pub use crate::worker::{InstallEvent, OfflineCache, StorageHandle};

/// Generation name used when none is configured.
pub const DEFAULT_GENERATION: &str = "si-cache-v1";
