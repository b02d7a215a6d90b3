//! Render result cache
//!
//! Memoizes the final rendered ANSI string per (source text, viewport
//! width, viewport height). The cache holds at most one value per key and
//! later stores overwrite earlier ones. It is never invalidated per key:
//! the consumer discards the whole cache (or this object) when the viewport
//! or the document set changes, because wrap-width-dependent output would
//! otherwise go stale.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub width: u16,
    pub height: u16,
}

impl CacheKey {
    pub fn new(source: impl Into<String>, width: u16, height: u16) -> Self {
        Self {
            source: source.into(),
            width,
            height,
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<CacheKey, String>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<&String> {
        self.entries.get(key)
    }

    pub fn store(&mut self, key: CacheKey, rendered: String) {
        self.entries.insert(key, rendered);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_miss_then_hit() {
        let mut cache = RenderCache::new();
        let key = CacheKey::new("# hi", 80, 24);
        assert!(cache.lookup(&key).is_none());
        cache.store(key.clone(), "rendered".into());
        assert_eq!(cache.lookup(&key).unwrap(), "rendered");
    }

    #[test]
    fn test_dimension_is_part_of_key() {
        let mut cache = RenderCache::new();
        cache.store(CacheKey::new("doc", 80, 24), "wide".into());
        assert!(cache.lookup(&CacheKey::new("doc", 60, 24)).is_none());
        assert!(cache.lookup(&CacheKey::new("doc", 80, 20)).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = RenderCache::new();
        let key = CacheKey::new("doc", 80, 24);
        cache.store(key.clone(), "first".into());
        cache.store(key.clone(), "second".into());
        assert_eq!(cache.lookup(&key).unwrap(), "second");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_is_wholesale() {
        let mut cache = RenderCache::new();
        cache.store(CacheKey::new("a", 80, 24), "1".into());
        cache.store(CacheKey::new("b", 80, 24), "2".into());
        cache.clear();
        assert!(cache.is_empty());
    }
}
