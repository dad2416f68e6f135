//! A directory of `<id>.json` files.

use std::fs;
use std::path::{Path, PathBuf};

use formcalc_core::Submission;
use tracing::{debug, info};

use crate::error::{validate_id, Result, StoreError};
use crate::traits::SubmissionStore;

const EXTENSION: &str = "json";

/// Stores each submission as pretty-printed JSON in `<dir>/<id>.json`.
///
/// Writes go to a temporary sibling file that is then renamed over the
/// target, so a reader never sees a half-written submission.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `id`.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }
}

impl SubmissionStore for JsonFileStore {
    fn load(&self, id: &str) -> Result<Submission> {
        let path = self.path_for(id)?;
        debug!(?path, "loading submission");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(id));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, id: &str, submission: &Submission) -> Result<()> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(submission)?;
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        let written = fs::write(&tmp, format!("{}\n", json)).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            // The temp file may or may not exist at this point.
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        info!(?path, fields = submission.len(), "saved submission");
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.path_for(id)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcalc_core::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        // A non-empty directory where the file should go makes the rename fail.
        fs::create_dir_all(dir.path().join("busy.json/inner")).unwrap();

        let sub: Submission = [("qty", 1_i64)].into_iter().collect();
        let err = store.save("busy", &sub).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)), "unexpected error: {:?}", err);
        assert!(!dir.path().join("busy.json.tmp").exists());
        assert!(dir.path().join("busy.json/inner").is_dir());
    }

    #[test]
    fn roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("submissions"));

        let sub: Submission = [
            ("price", Value::from("12.50")),
            ("qty", Value::from(3_i64)),
        ]
        .into_iter()
        .collect();
        store.save("order-7", &sub).unwrap();

        assert!(store.exists("order-7").unwrap());
        assert_eq!(store.load("order-7").unwrap(), sub);

        let raw = fs::read_to_string(dir.path().join("submissions/order-7.json")).unwrap();
        assert!(raw.contains("\"qty\": 3"));
        assert!(!dir.path().join("submissions/order-7.json.tmp").exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("absent").unwrap_err().is_not_found());
        assert!(!store.exists("absent").unwrap());
    }

    #[test]
    fn invalid_json_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.load("broken").unwrap_err(),
            StoreError::Serialization(_)
        ));
    }

    #[test]
    fn ids_cannot_escape_the_directory() {
        let store = JsonFileStore::new("/tmp/formcalc-never-used");
        assert!(matches!(
            store.path_for("../secrets"),
            Err(StoreError::InvalidId { .. })
        ));
    }
}
