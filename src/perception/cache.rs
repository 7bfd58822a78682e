use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::perception::types::ScreenshotResult;

struct Entry {
    key: String,
    frame: ScreenshotResult,
    inserted: Instant,
}

/// Small insertion-ordered frame cache.
///
/// Full cache drops the oldest insertion; expiry only happens when
/// [`FrameCache::evict_expired`] is called.
pub struct FrameCache {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn cache(&mut self, key: impl Into<String>, frame: ScreenshotResult) {
        self.cache_at(key.into(), frame, Instant::now());
    }

    fn cache_at(&mut self, key: String, frame: ScreenshotResult, now: Instant) {
        self.entries.retain(|e| e.key != key);
        while self.entries.len() >= self.capacity {
            if let Some(old) = self.entries.pop_front() {
                tracing::trace!(key = %old.key, "frame cache full, dropping oldest");
            }
        }
        self.entries.push_back(Entry {
            key,
            frame,
            inserted: now,
        });
    }

    pub fn get(&self, key: &str) -> Option<&ScreenshotResult> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.frame)
    }

    /// Drop every entry at least `max_age` old. Returns how many went.
    pub fn evict_expired(&mut self, max_age: Duration) -> usize {
        self.evict_expired_at(Instant::now(), max_age)
    }

    fn evict_expired_at(&mut self, now: Instant, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| now.saturating_duration_since(e.inserted) < max_age);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
