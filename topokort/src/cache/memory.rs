//! In-memory tile cache with FIFO eviction and request coalescing.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use image::RgbaImage;
use parking_lot::Mutex;
use tracing::trace;

use super::{CacheStats, TileLoadError, DEFAULT_CACHE_CAPACITY};

type TileFuture = Shared<BoxFuture<'static, Result<Arc<RgbaImage>, TileLoadError>>>;

struct CacheEntry {
    future: TileFuture,
    generation: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order
    order: VecDeque<String>,
}

impl CacheInner {
    fn remove(&mut self, url: &str) -> bool {
        if self.entries.remove(url).is_some() {
            self.order.retain(|k| k != url);
            true
        } else {
            false
        }
    }
}

/// URL-keyed cache of pending or decoded tiles.
///
/// The cache never holds more than `capacity` entries: the oldest entry is
/// evicted before a new one is inserted. Failed fetches are removed so the
/// next request starts over.
pub struct TileCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl TileCache {
    /// Creates a cache holding at most `capacity` tiles (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            next_generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the cached tile for `url`, joining an in-flight fetch if one
    /// exists, or starts `fetch` otherwise.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Result<Arc<RgbaImage>, TileLoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<RgbaImage>, TileLoadError>> + Send + 'static,
    {
        let (future, generation) = {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.entries.get(url) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                (entry.future.clone(), entry.generation)
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                while inner.entries.len() >= self.capacity {
                    let Some(oldest) = inner.order.pop_front() else {
                        break;
                    };
                    if inner.entries.remove(&oldest).is_some() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        trace!(url = %oldest, "Evicted tile from cache");
                    }
                }
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let future = fetch().boxed().shared();
                inner.entries.insert(
                    url.to_string(),
                    CacheEntry {
                        future: future.clone(),
                        generation,
                    },
                );
                inner.order.push_back(url.to_string());
                (future, generation)
            }
        };

        let result = future.await;
        if result.is_err() {
            // A newer entry may have replaced this one after an invalidate.
            let mut inner = self.inner.lock();
            if inner
                .entries
                .get(url)
                .is_some_and(|entry| entry.generation == generation)
            {
                inner.remove(url);
            }
        }
        result
    }

    /// Drops the entry for `url` so the next request fetches again.
    pub fn invalidate(&self, url: &str) -> bool {
        self.inner.lock().remove(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.lock().entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Removes every entry. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use image::Rgba;

    use crate::provider::HttpError;

    fn tile() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])))
    }

    fn ok_fetch(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> BoxFuture<'static, Result<Arc<RgbaImage>, TileLoadError>> {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(tile())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let cache = TileCache::new(10);
        let counter = Arc::new(AtomicUsize::new(0));

        let requests = (0..16).map(|_| cache.get_or_fetch("https://t/1.png", ok_fetch(&counter)));
        let results = futures::future::join_all(requests).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 15);
    }

    #[tokio::test]
    async fn test_fifo_eviction_respects_capacity() {
        let cache = TileCache::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..5 {
            cache
                .get_or_fetch(&format!("u{i}"), ok_fetch(&counter))
                .await
                .unwrap();
            assert!(cache.len() <= 3);
        }
        assert!(!cache.contains("u0"));
        assert!(!cache.contains("u1"));
        assert!(cache.contains("u4"));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_removed() {
        let cache = TileCache::new(3);
        let result = cache
            .get_or_fetch("bad", || async {
                Err(TileLoadError::Http(HttpError::Network {
                    url: "bad".into(),
                    message: "reset".into(),
                }))
            })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains("bad"));
    }

    #[tokio::test]
    async fn test_evicted_bitmap_stays_valid() {
        let cache = TileCache::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let first = cache.get_or_fetch("a", ok_fetch(&counter)).await.unwrap();
        cache.get_or_fetch("b", ok_fetch(&counter)).await.unwrap();
        assert!(!cache.contains("a"));
        assert_eq!(first.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = TileCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CACHE_CAPACITY);
        let counter = Arc::new(AtomicUsize::new(0));
        cache.get_or_fetch("a", ok_fetch(&counter)).await.unwrap();
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.get_or_fetch("a", ok_fetch(&counter)).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        cache.clear();
        cache.clear();
        assert!(cache.is_empty());
    }
}
