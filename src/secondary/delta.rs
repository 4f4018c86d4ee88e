use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::payload::Payload;

/// Mutations recorded by the workers of one phase, keyed by document key.
///
/// `None` marks a removed document. A later record of the same key
/// replaces the earlier one.
#[derive(Default)]
pub struct DeltaMap {
    entries: Mutex<BTreeMap<String, Option<Value>>>,
}

impl DeltaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the new content of a document. Binary documents are not
    /// mirrored and are ignored.
    pub fn record_upsert(&self, key: &str, payload: &Payload) {
        if let Payload::Json(doc) = payload {
            self.entries.lock().insert(key.to_string(), Some(doc.clone()));
        }
    }

    pub fn record_tombstone(&self, key: &str) {
        self.entries.lock().insert(key.to_string(), None);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Takes all recorded entries, leaving the map empty.
    pub fn take(&self) -> BTreeMap<String, Option<Value>> {
        std::mem::take(&mut *self.entries.lock())
    }
}
