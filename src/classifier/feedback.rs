use std::collections::HashMap;

/// Explicit per-app user corrections, keyed by normalized app identifier.
///
/// Entries here outrank every other strategy except the curated correction
/// map, and are only ever written through `record_feedback`.
#[derive(Debug, Default)]
pub struct FeedbackStore {
    entries: HashMap<String, bool>,
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, clean_app: &str) -> Option<bool> {
        self.entries.get(clean_app).copied()
    }

    pub fn set(&mut self, clean_app: &str, is_productive: bool) {
        self.entries.insert(clean_app.to_string(), is_productive);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
