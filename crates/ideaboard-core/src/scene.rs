//! Immutable scene of committed elements.
//!
//! A [`Scene`] is a value: every mutation returns a new scene that shares the
//! untouched elements with its predecessor, so history snapshots and the
//! renderer can hold on to one cheaply.

use crate::shapes::{
    Element, ElementError, ElementId, ElementKind, ElementStyle, ParticipantId, Shape,
};
use kurbo::{Point, Rect};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

/// Scene mutation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("element {0} already exists")]
    DuplicateId(ElementId),
    #[error("element {0} not found")]
    NotFound(ElementId),
    #[error("element {id} is a {found}, not a {expected}")]
    WrongKind {
        id: ElementId,
        expected: ElementKind,
        found: ElementKind,
    },
    #[error("stale update for {id}: version {proposed} is not newer than {current}")]
    StaleVersion {
        id: ElementId,
        current: u64,
        proposed: u64,
    },
    #[error("invalid element: {0}")]
    Invalid(#[from] ElementError),
    #[error("scene serialization error: {0}")]
    Serialization(String),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Changes to an existing element.
#[derive(Debug, Clone)]
pub struct ElementPatch {
    pub shape: Option<Shape>,
    pub style: Option<ElementStyle>,
    /// Must be greater than the element's current version.
    pub version: u64,
    pub author: Option<ParticipantId>,
}

/// One entry of [`Scene::diff`].
#[derive(Debug, Clone, PartialEq)]
pub enum SceneChange {
    Created(Element),
    Updated(Element),
    Deleted(ElementId),
}

/// Ordered collection of elements. Order is render order (back to front).
#[derive(Debug, Clone, Default)]
pub struct Scene {
    elements: Arc<Vec<Arc<Element>>>,
}

impl PartialEq for Scene {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements) || self.elements == other.elements
    }
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene by inserting each element in order.
    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> SceneResult<Self> {
        let mut list: Vec<Arc<Element>> = Vec::new();
        for element in elements {
            element.validate()?;
            if list.iter().any(|e| e.id == element.id) {
                return Err(SceneError::DuplicateId(element.id));
            }
            list.push(Arc::new(element));
        }
        Ok(Self::from_list(list))
    }

    fn from_list(list: Vec<Arc<Element>>) -> Self {
        Self {
            elements: Arc::new(list),
        }
    }

    fn position(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id).map(Arc::as_ref)
    }

    /// Elements in z-order (back to front).
    pub fn iter(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.iter().map(Arc::as_ref)
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.elements.iter().map(|e| e.id).collect()
    }

    /// Highest element version in the scene.
    pub fn max_version(&self) -> u64 {
        self.elements.iter().map(|e| e.version).max().unwrap_or(0)
    }

    /// Whether both scenes share the same storage.
    pub fn ptr_eq(&self, other: &Scene) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements)
    }

    /// Append an element on top of the scene.
    pub fn insert(&self, element: Element) -> SceneResult<Scene> {
        element.validate()?;
        if self.contains(element.id) {
            return Err(SceneError::DuplicateId(element.id));
        }
        let mut list = self.elements.as_ref().clone();
        list.push(Arc::new(element));
        Ok(Self::from_list(list))
    }

    /// Apply a patch to an existing element, keeping its z-position.
    pub fn update(&self, id: ElementId, patch: ElementPatch) -> SceneResult<Scene> {
        let index = self.position(id).ok_or(SceneError::NotFound(id))?;
        let current = &self.elements[index];
        if patch.version <= current.version {
            return Err(SceneError::StaleVersion {
                id,
                current: current.version,
                proposed: patch.version,
            });
        }
        let mut element = current.as_ref().clone();
        if let Some(shape) = patch.shape {
            element.shape = shape;
        }
        if let Some(style) = patch.style {
            element.style = style;
        }
        element.version = patch.version;
        element.author = patch.author;
        self.swap_at(index, element)
    }

    /// Replace an existing element wholesale, keeping its z-position.
    ///
    /// Unlike [`Scene::update`] this does not check versions; callers
    /// resolve ordering themselves.
    pub fn replace(&self, element: Element) -> SceneResult<Scene> {
        let index = self.position(element.id).ok_or(SceneError::NotFound(element.id))?;
        self.swap_at(index, element)
    }

    fn swap_at(&self, index: usize, element: Element) -> SceneResult<Scene> {
        element.validate()?;
        let mut list = self.elements.as_ref().clone();
        list[index] = Arc::new(element);
        Ok(Self::from_list(list))
    }

    pub fn remove(&self, id: ElementId) -> SceneResult<Scene> {
        let index = self.position(id).ok_or(SceneError::NotFound(id))?;
        let mut list = self.elements.as_ref().clone();
        list.remove(index);
        Ok(Self::from_list(list))
    }

    /// Remove every listed element that is present; unknown ids are skipped.
    pub fn remove_all(&self, ids: &[ElementId]) -> Scene {
        let list = self
            .elements
            .iter()
            .filter(|e| !ids.contains(&e.id))
            .cloned()
            .collect();
        Self::from_list(list)
    }

    pub fn clear(&self) -> Scene {
        Scene::new()
    }

    /// Bounding box of all elements.
    pub fn bounds(&self) -> Option<Rect> {
        self.iter()
            .map(Element::bounds)
            .reduce(|acc, rect| acc.union(rect))
    }

    /// Ids of the elements under `point`, topmost first.
    pub fn elements_at_point(&self, point: Point, tolerance: f64) -> Vec<ElementId> {
        self.elements
            .iter()
            .rev()
            .filter(|e| e.hit_test(point, tolerance))
            .map(|e| e.id)
            .collect()
    }

    /// Changes that turn `self` into `other`.
    ///
    /// Elements compare by content; version metadata is ignored.
    pub fn diff(&self, other: &Scene) -> Vec<SceneChange> {
        let mut changes = Vec::new();
        for element in self.iter() {
            if !other.contains(element.id) {
                changes.push(SceneChange::Deleted(element.id));
            }
        }
        for element in other.iter() {
            match self.get(element.id) {
                None => changes.push(SceneChange::Created(element.clone())),
                Some(previous) if !previous.same_content(element) => {
                    changes.push(SceneChange::Updated(element.clone()))
                }
                Some(_) => {}
            }
        }
        changes
    }

    /// Serialize to JSON (ordered element list).
    pub fn to_json(&self) -> SceneResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SceneError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        let elements: Vec<Element> =
            serde_json::from_str(json).map_err(|e| SceneError::Serialization(e.to_string()))?;
        Self::from_elements(elements)
    }
}

impl Serialize for Scene {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for Scene {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<Element>::deserialize(deserializer)?;
        Scene::from_elements(elements).map_err(serde::de::Error::custom)
    }
}
