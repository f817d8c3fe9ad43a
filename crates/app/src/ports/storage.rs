//! Storage port: persistence of directory snapshots.

use std::future::Future;

use thiefwatch_domain::directory::Directory;
use thiefwatch_domain::error::WatchError;

/// Loads and saves the whole directory tree.
///
/// `save` must be atomic: a reader of the underlying medium sees either the
/// previous or the new tree, never a mix.
pub trait DirectoryRepository {
    /// Load the last saved snapshot, `None` when nothing was ever saved.
    fn load(&self) -> impl Future<Output = Result<Option<Directory>, WatchError>> + Send;

    /// Replace the stored snapshot with `directory`.
    fn save(&self, directory: &Directory) -> impl Future<Output = Result<(), WatchError>> + Send;
}

impl<T: DirectoryRepository + Send + Sync> DirectoryRepository for std::sync::Arc<T> {
    fn load(&self) -> impl Future<Output = Result<Option<Directory>, WatchError>> + Send {
        (**self).load()
    }

    fn save(&self, directory: &Directory) -> impl Future<Output = Result<(), WatchError>> + Send {
        (**self).save(directory)
    }
}
