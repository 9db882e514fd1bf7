//! Tag library and per-nonce Digest counters.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ids::gen_tag;

/// The literal key under which the REGISTER dialog's From-tag is stored —
/// REGISTER has no Call-ID-keyed dialog, so it gets a fixed slot created
/// once and reused for every subsequent REGISTER/DEREGISTER.
pub const REGISTER_TAG_KEY: &str = "register";

/// Maps a dialog key (a Call-ID, or the literal `"register"`) to the local
/// From-tag used for that dialog. A tag is created once per key and never
/// regenerated, so every BYE/CANCEL/re-REGISTER within a dialog echoes the
/// same tag the dialog was opened with.
#[derive(Debug, Default)]
pub struct TagLibrary {
    tags: Mutex<HashMap<String, String>>,
}

impl TagLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tag for `key`, generating and storing one if absent.
    pub fn get_or_create(&self, key: &str) -> String {
        let mut guard = self.tags.lock().expect("tag library mutex poisoned");
        guard
            .entry(key.to_string())
            .or_insert_with(gen_tag)
            .clone()
    }

    /// Returns the tag for `key` without creating one.
    pub fn get(&self, key: &str) -> Option<String> {
        self.tags
            .lock()
            .expect("tag library mutex poisoned")
            .get(key)
            .cloned()
    }

    /// Removes the tag for `key`, e.g. once a dialog has terminated.
    pub fn remove(&self, key: &str) {
        self.tags.lock().expect("tag library mutex poisoned").remove(key);
    }
}

/// Tracks the Digest `nc` (nonce-count) value per server-issued nonce.
/// Entries are created lazily on first use and are never evicted — a
/// long-lived agent accumulates one entry per distinct nonce the registrar
/// has handed out, which in practice is a handful over the agent's life.
#[derive(Debug, Default)]
pub struct NonceCounters {
    counters: Mutex<HashMap<String, u32>>,
}

impl NonceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next `nc` value for `nonce`, starting at 1.
    pub fn next(&self, nonce: &str) -> u32 {
        let mut guard = self.counters.lock().expect("nonce counter mutex poisoned");
        let entry = guard.entry(nonce.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }
}
