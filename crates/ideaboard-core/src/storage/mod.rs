//! Scene persistence.
//!
//! Backends store scenes under a board name as the ordered element list
//! produced by [`Scene::to_json`].

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::scene::{Scene, SceneError};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("board not found: {0}")]
    NotFound(String),
    #[error("invalid board name: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future returned by [`Storage`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A place to keep named scenes.
pub trait Storage: Send + Sync {
    /// Save `scene` under `name`, replacing any previous copy.
    fn save(&self, name: &str, scene: &Scene) -> BoxFuture<'_, StorageResult<()>>;

    fn load(&self, name: &str) -> BoxFuture<'_, StorageResult<Scene>>;

    /// Delete a board. Deleting a missing board is not an error.
    fn delete(&self, name: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Names of all stored boards, sorted.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    fn exists(&self, name: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

/// Reject names that are empty or only whitespace.
pub(crate) fn check_name(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        Err(StorageError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}
