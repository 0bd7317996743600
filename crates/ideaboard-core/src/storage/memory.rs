//! Process-local storage.

use super::{BoxFuture, Storage, StorageError, StorageResult, check_name};
use crate::scene::Scene;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Keeps boards in a map for the life of the process.
///
/// Boards are held in their serialized form, so a load goes through the
/// same validation as a board read from disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw JSON under `name` without checking it.
    pub fn insert_raw(&self, name: impl Into<String>, json: impl Into<String>) -> StorageResult<()> {
        self.documents
            .write()
            .map_err(lock_error)?
            .insert(name.into(), json.into());
        Ok(())
    }
}

fn lock_error<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Other("memory storage lock poisoned".to_string())
}

impl Storage for MemoryStorage {
    fn save(&self, name: &str, scene: &Scene) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        let json = scene.to_json();
        Box::pin(async move {
            check_name(&name)?;
            let json = json?;
            self.insert_raw(name, json)
        })
    }

    fn load(&self, name: &str) -> BoxFuture<'_, StorageResult<Scene>> {
        let name = name.to_string();
        Box::pin(async move {
            let json = self
                .documents
                .read()
                .map_err(lock_error)?
                .get(&name)
                .cloned()
                .ok_or(StorageError::NotFound(name))?;
            Ok(Scene::from_json(&json)?)
        })
    }

    fn delete(&self, name: &str) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        Box::pin(async move {
            self.documents.write().map_err(lock_error)?.remove(&name);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let documents = self.documents.read().map_err(lock_error)?;
            Ok(documents.keys().cloned().collect())
        })
    }

    fn exists(&self, name: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let name = name.to_string();
        Box::pin(async move { Ok(self.documents.read().map_err(lock_error)?.contains_key(&name)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneError;
    use crate::shapes::{Element, ElementStyle, Shape, Sticky};
    use kurbo::Point;
    use pollster::block_on;

    fn retro() -> Scene {
        Scene::new()
            .insert(Element::new(
                Shape::Sticky(Sticky::new(Point::new(5.0, 5.0), "went well")),
                ElementStyle::default(),
            ))
            .unwrap()
    }

    #[test]
    fn test_round_trip_keeps_order_and_content() {
        let storage = MemoryStorage::new();
        let scene = retro();
        block_on(storage.save("retro", &scene)).unwrap();
        assert_eq!(block_on(storage.load("retro")).unwrap(), scene);
    }

    #[test]
    fn test_missing_and_blank_names() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            block_on(storage.load("nope")),
            Err(StorageError::NotFound(name)) if name == "nope"
        ));
        assert!(matches!(
            block_on(storage.save("\t", &Scene::new())),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_corrupt_document_is_a_scene_error() {
        let storage = MemoryStorage::new();
        storage.insert_raw("broken", "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(
            block_on(storage.load("broken")),
            Err(StorageError::Scene(SceneError::Serialization(_)))
        ));
    }

    #[test]
    fn test_overwrite_delete_and_list() {
        let storage = MemoryStorage::new();
        block_on(storage.save("zeta", &retro())).unwrap();
        block_on(storage.save("alpha", &Scene::new())).unwrap();
        block_on(storage.save("zeta", &Scene::new())).unwrap();
        assert!(block_on(storage.load("zeta")).unwrap().is_empty());
        assert_eq!(block_on(storage.list()).unwrap(), vec!["alpha", "zeta"]);

        block_on(storage.delete("zeta")).unwrap();
        block_on(storage.delete("zeta")).unwrap();
        assert!(!block_on(storage.exists("zeta")).unwrap());
        assert!(block_on(storage.exists("alpha")).unwrap());
    }
}
