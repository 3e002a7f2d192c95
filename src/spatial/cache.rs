//! Query Result Cache
//!
//! Remembers recent rect and radius query answers keyed by the quantized
//! query shape. Lookups never check age: entries live until the owner
//! calls [`QueryCache::advance`] past the staleness window, calls
//! [`QueryCache::clear`], or the capacity guard flushes everything.
//! Answers can therefore lag the grid by up to one window.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{require_non_negative, require_positive, ConfigError};
use crate::fleet::FleetId;

/// Cache tuning.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Seconds an entry may be served before `advance` evicts it. Zero disables caching.
    pub window: f32,
    /// World units per quantization step of the cache key
    pub quantum: f32,
    /// Entry count at which the whole cache is flushed
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            window: 0.1,
            quantum: 1.0,
            capacity: 4096,
        }
    }
}

impl CacheConfig {
    /// Caching switched off entirely.
    pub fn disabled() -> Self {
        Self {
            window: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("cache.window", self.window)?;
        require_positive("cache.quantum", self.quantum)?;
        Ok(())
    }
}

/// Quantized query shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Rect { x: i64, y: i64, w: i64, h: i64 },
    Radius { x: i64, y: i64, r: i64 },
}

impl QueryKey {
    pub fn rect(x: f32, y: f32, w: f32, h: f32, quantum: f32) -> Self {
        Self::Rect {
            x: quantize(x, quantum),
            y: quantize(y, quantum),
            w: quantize(w, quantum),
            h: quantize(h, quantum),
        }
    }

    pub fn radius(x: f32, y: f32, r: f32, quantum: f32) -> Self {
        Self::Radius {
            x: quantize(x, quantum),
            y: quantize(y, quantum),
            r: quantize(r, quantum),
        }
    }
}

#[inline]
fn quantize(value: f32, quantum: f32) -> i64 {
    (value / quantum).round() as i64
}

struct CacheEntry {
    ids: Vec<FleetId>,
    stored_at: f64,
}

/// Per-grid cache of query answers.
pub struct QueryCache {
    config: CacheConfig,
    entries: HashMap<QueryKey, CacheEntry>,
    /// Cache clock in seconds, moved forward by `advance`
    now: f64,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            now: 0.0,
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.config.window > 0.0
    }

    #[inline]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[inline]
    pub fn quantum(&self) -> f32 {
        self.config.quantum
    }

    /// Cached answer for `key`, counting the hit or miss.
    pub fn get(&mut self, key: &QueryKey) -> Option<Vec<FleetId>> {
        if !self.enabled() {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.ids.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: QueryKey, ids: &[FleetId]) {
        if !self.enabled() {
            return;
        }
        if self.entries.len() >= self.config.capacity && !self.entries.contains_key(&key) {
            self.entries.clear();
        }
        self.entries.insert(
            key,
            CacheEntry {
                ids: ids.to_vec(),
                stored_at: self.now,
            },
        );
    }

    /// Move the cache clock forward and evict entries older than the window.
    pub fn advance(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.now += f64::from(dt);
        let horizon = self.now - f64::from(self.config.window);
        self.entries.retain(|_, entry| entry.stored_at > horizon);
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

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
