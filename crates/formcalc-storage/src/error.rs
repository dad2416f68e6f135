//! Storage error types.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No submission is stored under the id.
    #[error("submission not found: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// The id cannot be used as a storage key.
    #[error("invalid submission id '{id}': {reason}")]
    InvalidId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Reading or writing the backing files failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Creates a [`StoreError::NotFound`] for the given id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a [`StoreError::InvalidId`].
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Check that `id` is usable as a key: non-empty, ASCII alphanumerics plus
/// `-`, `_`, `.`, and not starting with a dot.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(StoreError::invalid_id(id, "id is empty"));
    }
    if id.starts_with('.') {
        return Err(StoreError::invalid_id(id, "id must not start with '.'"));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(StoreError::invalid_id(id, format!("character '{}' is not allowed", c)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_ids() {
        assert!(validate_id("order-42").is_ok());
        assert!(validate_id("2024_01.a").is_ok());
    }

    #[test]
    fn rejects_path_like_ids() {
        assert!(validate_id("").is_err());
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id(".hidden").is_err());
        let err = validate_id("a b").unwrap_err();
        assert_eq!(err.to_string(), "invalid submission id 'a b': character ' ' is not allowed");
    }

    #[test]
    fn not_found_predicate() {
        assert!(StoreError::not_found("x").is_not_found());
        assert!(!StoreError::Internal("x".into()).is_not_found());
    }
}
