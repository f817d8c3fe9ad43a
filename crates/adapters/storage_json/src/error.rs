//! Storage-specific error type wrapping IO and JSON errors.

use std::path::PathBuf;

use thiefwatch_domain::error::WatchError;

/// Errors originating from the JSON snapshot storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading, writing or renaming the snapshot failed.
    #[error("snapshot io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot JSON error")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl From<StorageError> for WatchError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_into_storage_error() {
        let err = StorageError::io("/tmp/x.json")(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "snapshot io error on /tmp/x.json");
        let watch: WatchError = err.into();
        assert!(matches!(watch, WatchError::Storage(_)));
    }
}
