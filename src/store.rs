use std::sync::{Arc, RwLock};

use crate::reading::Reading;

/// Holds the single most recent reading. `set` swaps the whole `Arc`, so a
/// concurrent `get` observes either the old or the new reading, never a mix.
#[derive(Debug, Default)]
pub struct ReadingStore {
    latest: RwLock<Option<Arc<Reading>>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, reading: Arc<Reading>) {
        let mut slot = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(reading);
    }

    pub fn get(&self) -> Option<Arc<Reading>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
