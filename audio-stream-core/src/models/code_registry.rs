use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::error::StreamError;

/// Open enumeration keyed by a stable integer code.
///
/// Seeded with well-known values at first use. New values can be added at
/// runtime; a code can only ever be bound once.
pub(crate) struct CodeRegistry<T> {
    kind: &'static str,
    entries: RwLock<BTreeMap<u32, T>>,
}

impl<T: Clone> CodeRegistry<T> {
    pub(crate) fn new(kind: &'static str, seed: impl IntoIterator<Item = (u32, T)>) -> Self {
        Self {
            kind,
            entries: RwLock::new(seed.into_iter().collect()),
        }
    }

    /// Bind `code` to `value`. Fails if the code is already bound.
    pub(crate) fn register(&self, code: u32, value: T) -> Result<T, StreamError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&code) {
            return Err(StreamError::DuplicateCode {
                kind: self.kind,
                code,
            });
        }
        entries.insert(code, value.clone());
        log::debug!("registered {} code {:#x}", self.kind, code);
        Ok(value)
    }

    pub(crate) fn resolve(&self, code: u32) -> Option<T> {
        self.entries.read().get(&code).cloned()
    }

    /// Every registered value, ordered by code.
    pub(crate) fn values(&self) -> Vec<T> {
        self.entries.read().values().cloned().collect()
    }
}
