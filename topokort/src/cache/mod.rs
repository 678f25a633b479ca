//! Session-scoped tile bitmap cache.
//!
//! Tiles are keyed by their full request URL. Concurrent requests for the
//! same URL share one in-flight fetch; finished bitmaps are handed out as
//! `Arc<RgbaImage>` so an evicted entry never invalidates a draw that still
//! holds it.

mod memory;

pub use memory::TileCache;

use std::fmt;

use thiserror::Error;

use crate::provider::HttpError;

/// Default maximum number of cached tiles.
pub const DEFAULT_CACHE_CAPACITY: usize = 720;

/// Failure loading one tile.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileLoadError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Failed to decode tile {url}: {message}")]
    Decode { url: String, message: String },
}

impl TileLoadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TileLoadError::Http(e) => e.is_retryable(),
            TileLoadError::Decode { .. } => false,
        }
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`, zero before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses, {} evictions",
            self.entries, self.hits, self.misses, self.evictions
        )
    }
}
