//! Snapshot-based undo/redo.

use crate::scene::Scene;

/// Default number of snapshots to keep.
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Linear list of scene snapshots with a cursor.
///
/// Snapshots are [`Scene`] values, so retaining one costs a reference count
/// per unchanged element rather than a deep copy.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    snapshots: Vec<Scene>,
    index: usize,
    capacity: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(Scene::new())
    }
}

impl HistoryManager {
    /// Start a history whose first snapshot is `initial`.
    pub fn new(initial: Scene) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_capacity(initial: Scene, capacity: usize) -> Self {
        Self {
            snapshots: vec![initial],
            index: 0,
            capacity: capacity.max(1),
        }
    }

    /// Snapshot at the cursor.
    pub fn current(&self) -> &Scene {
        &self.snapshots[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    /// Record a new snapshot, discarding any redo branch.
    pub fn commit(&mut self, scene: Scene) {
        self.snapshots.truncate(self.index + 1);
        self.snapshots.push(scene);
        if self.snapshots.len() > self.capacity {
            let overflow = self.snapshots.len() - self.capacity;
            self.snapshots.drain(..overflow);
            log::debug!("History full, dropped {overflow} oldest snapshot(s)");
        }
        self.index = self.snapshots.len() - 1;
    }

    /// Step back. Returns the restored scene, or `None` at the origin.
    pub fn undo(&mut self) -> Option<&Scene> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    /// Step forward. Returns the restored scene, or `None` at the tip.
    pub fn redo(&mut self) -> Option<&Scene> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    /// Replace the snapshot at the cursor without moving it.
    pub fn amend(&mut self, scene: Scene) {
        self.snapshots[self.index] = scene;
    }

    /// Drop everything and start over from `scene`.
    pub fn reset(&mut self, scene: Scene) {
        self.snapshots.clear();
        self.snapshots.push(scene);
        self.index = 0;
    }
}
