use crate::models::GenerationResult;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCategory {
    Error,
}

impl FlashCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashCategory::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
struct SessionData {
    result: Option<GenerationResult>,
    flashes: Vec<Flash>,
    last_used: u64,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.result.is_none() && self.flashes.is_empty()
    }
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<String, SessionData>,
    clock: u64,
}

impl Sessions {
    /// Fetch or create the entry for `id`, evicting the least recently used
    /// session once `max` entries are held.
    fn touch(&mut self, id: &str, max: usize) -> &mut SessionData {
        self.clock += 1;
        if !self.entries.contains_key(id) && self.entries.len() >= max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, data)| data.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        let clock = self.clock;
        let data = self.entries.entry(id.to_string()).or_default();
        data.last_used = clock;
        data
    }
}

/// In-memory per-browser state, keyed by the session cookie. Entries with
/// nothing left to show are dropped, and at most `max_sessions` are kept.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reuse the cookie's id when it is well formed, otherwise mint one.
    pub fn resolve(&self, cookie: Option<&str>) -> String {
        match cookie.and_then(|c| Uuid::parse_str(c).ok()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        }
    }

    pub fn flash(&self, id: &str, category: FlashCategory, message: impl Into<String>) {
        let max = self.max_sessions;
        self.lock().touch(id, max).flashes.push(Flash {
            category,
            message: message.into(),
        });
    }

    pub fn take_flashes(&self, id: &str) -> Vec<Flash> {
        let mut sessions = self.lock();
        let flashes = match sessions.entries.get_mut(id) {
            Some(data) => std::mem::take(&mut data.flashes),
            None => return Vec::new(),
        };
        if sessions.entries.get(id).map_or(false, SessionData::is_empty) {
            sessions.entries.remove(id);
        }
        flashes
    }

    pub fn store_result(&self, id: &str, result: GenerationResult) {
        let max = self.max_sessions;
        self.lock().touch(id, max).result = Some(result);
    }

    pub fn result(&self, id: &str) -> Option<GenerationResult> {
        self.lock().entries.get(id).and_then(|s| s.result.clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
