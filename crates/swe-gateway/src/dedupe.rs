//! Delivery de-duplication keyed by comment id.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(12 * 60 * 60);

/// `comment_id → first_seen_ms` map with lazy eviction on insert.
pub struct CommentDeduper {
    window_ms: u64,
    seen: Mutex<HashMap<u64, u64>>,
}

impl CommentDeduper {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically record the id; true exactly once per retention window.
    pub fn mark_if_new(&self, comment_id: u64) -> bool {
        self.mark_if_new_at(comment_id, swe_core::current_unix_timestamp_ms())
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, HashMap<u64, u64>> {
        match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn mark_if_new_at(&self, comment_id: u64, now_ms: u64) -> bool {
        let mut seen = self.lock_seen();
        seen.retain(|_, first_seen| now_ms.saturating_sub(*first_seen) < self.window_ms);
        match seen.get(&comment_id) {
            Some(_) => false,
            None => {
                seen.insert(comment_id, now_ms);
                true
            }
        }
    }
}

impl Default for CommentDeduper {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUPE_WINDOW)
    }
}
