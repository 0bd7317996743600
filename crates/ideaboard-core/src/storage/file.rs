//! File-based storage: one JSON file per board.

use super::{BoxFuture, Storage, StorageError, StorageResult, check_name};
use crate::scene::Scene;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Stores each board as `<name>.json` in a directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Use `base_path`, creating it if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Storage under the user's data directory.
    ///
    /// On Linux: `~/.local/share/ideaboard/boards/`
    /// On Windows: `%LOCALAPPDATA%\ideaboard\boards\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Other("could not determine data directory".to_string()))?;
        Self::new(base.join("ideaboard").join("boards"))
    }

    /// File for a board name. Anything but ASCII alphanumerics, `-` and `_`
    /// becomes `_`.
    fn board_path(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{safe}.json"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Write through a sibling temp file so a crash never leaves half a board.
fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

impl Storage for FileStorage {
    fn save(&self, name: &str, scene: &Scene) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.board_path(name);
        let name = name.to_string();
        let json = scene.to_json();
        Box::pin(async move {
            check_name(&name)?;
            let json = json?;
            write_atomic(&path, &json)?;
            log::debug!("Saved board {name} to {}", path.display());
            Ok(())
        })
    }

    fn load(&self, name: &str) -> BoxFuture<'_, StorageResult<Scene>> {
        let path = self.board_path(name);
        let name = name.to_string();
        Box::pin(async move {
            let json = match fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StorageError::NotFound(name));
                }
                Err(e) => return Err(e.into()),
            };
            Ok(Scene::from_json(&json)?)
        })
    }

    fn delete(&self, name: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.board_path(name);
        Box::pin(async move {
            match fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            }
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            let mut names = Vec::new();
            for entry in fs::read_dir(&base)?.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
            names.sort();
            Ok(names)
        })
    }

    fn exists(&self, name: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.board_path(name);
        Box::pin(async move { Ok(path.is_file()) })
    }
}
