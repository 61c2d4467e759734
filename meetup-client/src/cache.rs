use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Errors raised by a cache back end. They never leave [`Cache`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend: {0}")]
    Backend(String),
    #[error("cache codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Narrow interface over an external key-value cache with expirations.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` is a miss, distinct from a failing back end.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// Configuration for the in-process store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum number of cached entries
    pub max_entries: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            enabled: true,
        }
    }
}

/// Stored value with metadata
#[derive(Clone, Debug)]
pub struct StoredEntry {
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl StoredEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            created_at: Utc::now(),
            ttl,
        }
    }

    /// Check if the entry is still valid
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.created_at + self.ttl
    }
}

/// In-memory store using DashMap for thread safety
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    pub config: StoreConfig,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        if !self.config.enabled {
            return None;
        }

        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid() {
                return Some(entry.data.clone());
            }
        }
        // Expired entries are dropped on read, once the read guard is gone.
        self.entries.remove_if(key, |_, entry| !entry.is_valid());
        None
    }

    fn write(&self, key: &str, data: Vec<u8>, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        if !self.entries.contains_key(key) && self.entries.len() >= self.config.max_entries {
            self.evict_expired();

            if self.entries.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        self.entries.insert(key.to_string(), StoredEntry::new(data, ttl));
    }

    /// Remove expired entries
    pub fn evict_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid());
        log::debug!("Evicted {} expired cache entries", before - self.entries.len());
    }

    /// Remove the oldest quarter of the entries when at capacity
    fn evict_oldest(&self) {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        entries.sort_by_key(|(_, created_at)| *created_at);

        let to_remove = (self.config.max_entries / 4).max(1);
        for (key, _) in entries.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }

        log::debug!("Evicted {} oldest cache entries", to_remove);
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.clear();
        log::info!("Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let total_entries = self.entries.len();
        let expired_entries = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_valid())
            .count();

        CacheStats {
            total_entries,
            valid_entries: total_entries - expired_entries,
            expired_entries,
            max_entries: self.config.max_entries,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.write(key, value, ttl);
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
}

/// Outcome of a typed lookup
#[derive(Debug)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Failed(CacheError),
}

/// Typed, fail-open access to a [`KeyValueStore`].
///
/// Values are stored as JSON. Back end and codec failures are logged here and
/// degrade to a miss (on reads) or a no-op (on writes).
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => CacheLookup::Hit(value),
                Err(e) => CacheLookup::Failed(e.into()),
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => CacheLookup::Failed(e),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.lookup(key).await {
            CacheLookup::Hit(value) => {
                log::debug!("Cache hit for key: {:?}", key);
                Some(value)
            }
            CacheLookup::Miss => {
                log::debug!("Cache miss for key: {:?}", key);
                None
            }
            CacheLookup::Failed(e) => {
                log::error!("cache get {:?}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("cache set {:?}: {}", key, CacheError::from(e));
                return;
            }
        };

        match self.store.set(key, bytes, ttl).await {
            Ok(()) => log::debug!("Stored in cache with key: {:?}", key),
            Err(e) => log::error!("cache set {:?}: {}", key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::FailingStore;

    #[test]
    fn test_stored_entry_validity() {
        let entry = StoredEntry::new(vec![], Duration::seconds(1));
        assert!(entry.is_valid());

        let expired = StoredEntry {
            data: vec![],
            created_at: Utc::now() - Duration::seconds(2),
            ttl: Duration::seconds(1),
        };
        assert!(!expired.is_valid());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let store = MemoryStore::default();
        store.write("old", b"1".to_vec(), Duration::seconds(-1));
        store.write("fresh", b"2".to_vec(), Duration::hours(1));

        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.get("fresh").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.stats().total_entries, 1);
    }

    #[test]
    fn test_capacity_eviction_prefers_expired_then_oldest() {
        let store = MemoryStore::new(StoreConfig {
            max_entries: 4,
            enabled: true,
        });
        store.write("expired", vec![], Duration::seconds(-1));
        for (age, key) in [(30, "a"), (20, "b"), (10, "c")] {
            store.entries.insert(
                key.to_string(),
                StoredEntry {
                    data: vec![],
                    created_at: Utc::now() - Duration::seconds(age),
                    ttl: Duration::hours(1),
                },
            );
        }

        store.write("d", vec![], Duration::hours(1));
        assert!(store.read("expired").is_none());
        assert_eq!(store.stats().total_entries, 4);

        store.write("e", vec![], Duration::hours(1));
        assert!(store.read("a").is_none());
        assert!(store.read("e").is_some());
        assert_eq!(store.stats().total_entries, 4);
    }

    #[test]
    fn test_disabled_store_keeps_nothing() {
        let store = MemoryStore::new(StoreConfig {
            max_entries: 10,
            enabled: false,
        });
        store.write("k", vec![1], Duration::hours(1));
        assert!(store.read("k").is_none());
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_hit_miss_failure() {
        let cache = Cache::new(Arc::new(MemoryStore::default()));
        cache.set("ids", &vec!["golangsf"], Duration::hours(1)).await;

        assert!(matches!(
            cache.lookup::<Vec<String>>("ids").await,
            CacheLookup::Hit(ids) if ids == vec!["golangsf".to_string()]
        ));
        assert!(matches!(cache.lookup::<Vec<String>>("nope").await, CacheLookup::Miss));
        // Stored value of the wrong shape is a codec failure
        assert!(matches!(
            cache.lookup::<u32>("ids").await,
            CacheLookup::Failed(CacheError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_failing_backend_is_fail_open() {
        let cache = Cache::new(Arc::new(FailingStore));
        cache.set("k", "v", Duration::hours(1)).await;
        assert_eq!(cache.get::<String>("k").await, None);
        assert!(matches!(
            cache.lookup::<String>("k").await,
            CacheLookup::Failed(CacheError::Backend(_))
        ));
    }
}
