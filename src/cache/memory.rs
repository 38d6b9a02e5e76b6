use super::{Cache, CacheKey};
use crate::llm::Generation;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-lifetime cache backed by a `HashMap`.
///
/// There is no eviction, TTL or size bound; entries live as long as the
/// cache does.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<CacheKey, Vec<Generation>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Option<Vec<Generation>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn update(&self, key: CacheKey, value: Vec<Generation>) {
        self.entries.write().await.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_misses_until_updated() {
        let cache = InMemoryCache::new();
        let key = CacheKey::new("{}", "What is 2+2?");

        assert!(cache.lookup(&key).await.is_none());
        assert!(cache.is_empty().await);

        cache.update(key.clone(), vec![Generation::new("4")]).await;

        assert_eq!(cache.lookup(&key).await, Some(vec![Generation::new("4")]));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let cache = InMemoryCache::new();
        cache
            .update(CacheKey::new("{}", "a"), vec![Generation::new("1")])
            .await;
        cache
            .update(CacheKey::new("{}", "b"), vec![Generation::new("2")])
            .await;

        cache.clear().await;

        assert!(cache.is_empty().await);
    }
}
