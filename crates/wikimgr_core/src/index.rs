use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-local cache mapping wire-form page path to upstream page id.
///
/// Best-effort, never authoritative: a miss is resolved by search or a full
/// refresh, never by failing the operation. Refresh replaces the whole
/// mapping in one write so readers never observe a half-populated index,
/// and no lock is ever held across a network call.
#[derive(Debug, Default)]
pub struct PathIndex {
    mapping: RwLock<BTreeMap<String, i64>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<i64> {
        self.read().get(path).copied()
    }

    pub fn insert(&self, path: &str, id: i64) {
        self.write().insert(path.to_string(), id);
    }

    /// Drop every entry resolving to `id` (a page has one path, but a stale
    /// duplicate from an earlier refresh must not survive a delete).
    pub fn remove_id(&self, id: i64) {
        self.write().retain(|_, value| *value != id);
    }

    /// Swap in a freshly built mapping wholesale.
    pub fn replace_all(&self, mapping: BTreeMap<String, i64>) {
        *self.write() = mapping;
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ordered (path, id) pairs, cloned out so no lock outlives the call.
    pub fn entries(&self) -> Vec<(String, i64)> {
        self.read()
            .iter()
            .map(|(path, id)| (path.clone(), *id))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, i64>> {
        self.mapping
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, i64>> {
        self.mapping
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::PathIndex;

    #[test]
    fn replace_all_swaps_the_mapping() {
        let index = PathIndex::new();
        index.insert("stale/path", 1);

        let mut mapping = BTreeMap::new();
        mapping.insert("homelab/gpu-vm".to_string(), 7);
        mapping.insert("ai/ollama".to_string(), 9);
        index.replace_all(mapping);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("stale/path"), None);
        assert_eq!(index.get("homelab/gpu-vm"), Some(7));
    }

    #[test]
    fn remove_id_clears_stale_duplicates() {
        let index = PathIndex::new();
        index.insert("old/path", 5);
        index.insert("new/path", 5);
        index.insert("other", 6);

        index.remove_id(5);
        assert_eq!(index.get("old/path"), None);
        assert_eq!(index.get("new/path"), None);
        assert_eq!(index.get("other"), Some(6));
    }

    #[test]
    fn entries_are_ordered_by_path() {
        let index = PathIndex::new();
        index.insert("b/two", 2);
        index.insert("a/one", 1);
        assert_eq!(
            index.entries(),
            vec![("a/one".to_string(), 1), ("b/two".to_string(), 2)]
        );
    }
}
