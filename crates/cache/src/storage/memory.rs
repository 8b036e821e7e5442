//! In-memory cache storage.

use crate::entry::{CacheEntry, check_storable};
use crate::error::{ErrorKind, Result};
use crate::key::{CacheKey, validate as validate_generation};
use crate::storage::CacheStorage;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

type Generation = (String, HashMap<CacheKey, CacheEntry>);

/// In-memory cache storage.
///
/// Generations are kept in creation order behind a [`RwLock`], so all trait
/// methods operate on `&self` without external synchronisation, and
/// [`lookup_any()`](CacheStorage::lookup_any) searches the oldest generation
/// first, as the browser's `caches.match()` does.
///
/// # Examples
///
/// ```
/// use lectern_cache::{CacheStorage, MemoryStorage};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = MemoryStorage::with_generations(["si-cache-v1", "si-cache-v2"]);
/// assert_eq!(storage.generations().await?, vec!["si-cache-v1", "si-cache-v2"]);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStorage {
    name: String,
    generations: RwLock<Vec<Generation>>,
}

impl MemoryStorage {
    /// Create a storage pre-populated with empty generations.
    ///
    /// Panics if any name fails validation. If test setup is wrong, then
    /// test should not pass.
    pub fn with_generations(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut generations: Vec<Generation> = Vec::new();
        for name in names {
            let name = name.into();
            if validate_generation(&name).is_err() {
                // The panic here is DELIBERATE; there is no error result.
                panic!("MemoryStorage::with_generations: invalid generation {name:?}");
            }
            if !generations.iter().any(|(existing, _)| *existing == name) {
                generations.push((name, HashMap::new()));
            }
        }
        Self {
            name: "memory".to_string(),
            generations: RwLock::new(generations),
        }
    }

    /// Change the name of the storage.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn find<'a>(generations: &'a mut Vec<Generation>, name: &str) -> &'a mut HashMap<CacheKey, CacheEntry> {
        let index = match generations.iter().position(|(existing, _)| existing == name) {
            Some(index) => index,
            None => {
                generations.push((name.to_string(), HashMap::new()));
                generations.len() - 1
            },
        };
        &mut generations[index].1
    }
}
impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_generations(Vec::<String>::new())
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generations(&self) -> Result<Vec<String>> {
        Ok(self.generations.read().await.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn open(&self, generation: &str) -> Result<()> {
        let generation = validate_generation(generation)?;
        Self::find(&mut *self.generations.write().await, generation);
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let mut guard = self.generations.write().await;
        let before = guard.len();
        guard.retain(|(name, _)| name != generation);
        Ok(guard.len() != before)
    }

    async fn put(&self, generation: &str, entry: CacheEntry) -> Result<()> {
        let generation = validate_generation(generation)?;
        check_storable(&entry.key, &entry.response)?;
        let mut guard = self.generations.write().await;
        Self::find(&mut guard, generation).insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn put_all(&self, generation: &str, entries: Vec<CacheEntry>) -> Result<()> {
        let generation = validate_generation(generation)?;
        // Validate everything before touching the map; one bad entry and
        // nothing is stored.
        for entry in &entries {
            check_storable(&entry.key, &entry.response)?;
        }
        let mut guard = self.generations.write().await;
        let map = Self::find(&mut guard, generation);
        for entry in entries {
            map.insert(entry.key.clone(), entry);
        }
        Ok(())
    }

    async fn lookup(&self, generation: &str, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let guard = self.generations.read().await;
        Ok(guard.iter().find(|(name, _)| name == generation).and_then(|(_, map)| map.get(key).cloned()))
    }

    async fn keys(&self, generation: &str) -> Result<Vec<CacheKey>> {
        let guard = self.generations.read().await;
        let (_, map) = guard
            .iter()
            .find(|(name, _)| name == generation)
            .ok_or_else(|| exn::Exn::from(ErrorKind::GenerationNotFound(generation.to_string())))?;
        let mut keys: Vec<CacheKey> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
