//! Suppresses repeated firing of the same front-end action inside a short window
//! (double-clicks, repeated prompt lines). Owned by a presentation session, never by the store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_fired: HashMap<String, Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    pub fn should_fire(&mut self, key: &str) -> bool {
        self.should_fire_at(key, Instant::now())
    }

    /// Records `now` as the last firing of `key` when the action is allowed through.
    pub fn should_fire_at(&mut self, key: &str, now: Instant) -> bool {
        if let Some(last) = self.last_fired.get(key)
            && now.saturating_duration_since(*last) < self.window
        {
            return false;
        }

        self.last_fired.insert(key.to_string(), now);
        true
    }
}
