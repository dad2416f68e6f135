//! In-memory submission store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use formcalc_core::Submission;

use crate::error::{validate_id, Result, StoreError};
use crate::traits::SubmissionStore;

/// A [`SubmissionStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    submissions: RwLock<BTreeMap<String, Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubmissionStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Submission> {
        let guard = self
            .submissions
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        guard.get(id).cloned().ok_or_else(|| StoreError::not_found(id))
    }

    fn save(&self, id: &str, submission: &Submission) -> Result<()> {
        validate_id(id)?;
        let mut guard = self
            .submissions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        guard.insert(id.to_string(), submission.clone());
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let guard = self
            .submissions
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(guard.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcalc_core::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        let sub: Submission = [("qty", 2_i64)].into_iter().collect();
        store.save("order-1", &sub).unwrap();

        assert!(store.exists("order-1").unwrap());
        assert_eq!(store.load("order-1").unwrap(), sub);
        assert!(!store.exists("order-2").unwrap());
    }

    #[test]
    fn save_replaces() {
        let store = MemoryStore::new();
        let mut sub = Submission::new();
        sub.set("total", Value::Null);
        store.save("a", &sub).unwrap();
        sub.set("total", 5.0);
        store.save("a", &sub).unwrap();
        assert_eq!(store.load("a").unwrap().get("total"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.load("nope").unwrap_err().is_not_found());
        assert!(!store.exists("nope").unwrap());
    }

    #[test]
    fn invalid_id_rejected_on_save() {
        let store = MemoryStore::new();
        let err = store.save("../x", &Submission::new()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidId { .. }));
    }
}
