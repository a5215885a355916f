//! Document store: the live set of canvas elements.

use crate::element::{Element, ElementId, ElementPatch, NewElement, is_valid_extent, union_bounds};
use crate::snapshot::{DocumentSnapshot, ViewSettings};
use indexmap::IndexMap;
use kurbo::{Point, Rect};
use std::fmt;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Element already exists: {0}")]
    DuplicateId(ElementId),
    #[error("Invalid element size: {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
}

/// Why the whole document was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOrigin {
    /// Initial load from the backend.
    Load,
    /// Undo or redo.
    History,
    /// Full-document push from a collaborator.
    Remote,
}

/// A mutation notification delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Created(ElementId),
    Updated(ElementId),
    Removed(ElementId),
    Replaced(ReplaceOrigin),
    SettingsChanged,
}

/// Handle returned by [`DocumentStore::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&StoreChange) + Send>;

/// Holds the current elements in insertion order plus the view settings.
///
/// Observers are called synchronously after every successful mutation.
#[derive(Default)]
pub struct DocumentStore {
    elements: IndexMap<ElementId, Element>,
    settings: ViewSettings,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: u64,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("elements", &self.elements)
            .field("settings", &self.settings)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store already holding a snapshot.
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        let mut store = Self::new();
        store.install(snapshot);
        store
    }

    /// Register a change observer.
    pub fn observe(&mut self, observer: impl FnMut(&StoreChange) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn notify(&mut self, change: StoreChange) {
        for (_, observer) in &mut self.observers {
            observer(&change);
        }
    }

    /// Insert a new element.
    ///
    /// A missing identifier is generated; a missing stacking order becomes
    /// the current maximum plus one.
    pub fn create(&mut self, element: NewElement) -> Result<Element, StoreError> {
        if !is_valid_extent(element.width) || !is_valid_extent(element.height) {
            return Err(StoreError::InvalidSize {
                width: element.width,
                height: element.height,
            });
        }

        let id = element.id.unwrap_or_else(ElementId::generate);
        if self.elements.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }

        let z_index = element.z_index.unwrap_or_else(|| self.next_stacking_order());
        let stored = Element {
            id: id.clone(),
            kind: element.kind,
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
            content: element.content,
            style: element.style,
            z_index,
            locked: element.locked,
        };
        self.elements.insert(id.clone(), stored.clone());
        log::debug!("Created element {} ({:?})", id, stored.kind);
        self.notify(StoreChange::Created(id));
        Ok(stored)
    }

    /// Apply a patch. Unknown identifiers are a silent no-op returning false.
    pub fn update(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        let Some(element) = self.elements.get_mut(id) else {
            return false;
        };
        patch.apply(element);
        self.notify(StoreChange::Updated(id.clone()));
        true
    }

    /// Remove an element. Removing an absent identifier does nothing.
    pub fn remove(&mut self, id: &ElementId) -> Option<Element> {
        let removed = self.elements.shift_remove(id)?;
        self.notify(StoreChange::Removed(id.clone()));
        Some(removed)
    }

    /// Deep copy of all elements and the view settings.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::new(self.elements.values().cloned().collect(), self.settings)
    }

    /// Atomically discard all elements and install `snapshot`.
    pub fn replace(&mut self, snapshot: DocumentSnapshot, origin: ReplaceOrigin) {
        self.install(snapshot);
        log::debug!("Document replaced ({:?}), {} elements", origin, self.elements.len());
        self.notify(StoreChange::Replaced(origin));
    }

    fn install(&mut self, snapshot: DocumentSnapshot) {
        let mut elements = IndexMap::with_capacity(snapshot.elements.len());
        for element in snapshot.elements {
            if elements.contains_key(&element.id) {
                log::warn!("Duplicate element id {} in snapshot, keeping the last", element.id);
            }
            elements.insert(element.id.clone(), element);
        }
        self.elements = elements;
        self.settings = snapshot.settings;
    }

    /// Maximum stacking order plus one, or 1 for an empty document.
    pub fn next_stacking_order(&self) -> i64 {
        self.elements
            .values()
            .map(|e| e.z_index)
            .max()
            .map_or(1, |z| z + 1)
    }

    pub fn settings(&self) -> ViewSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: ViewSettings) {
        if self.settings == settings {
            return;
        }
        self.settings = settings;
        self.notify(StoreChange::SettingsChanged);
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ElementId> {
        self.elements.keys()
    }

    /// Elements bottom to top. Ties keep insertion order.
    pub fn by_stacking_order(&self) -> Vec<&Element> {
        let mut ordered: Vec<&Element> = self.elements.values().collect();
        ordered.sort_by_key(|e| e.z_index);
        ordered
    }

    /// Topmost element containing `point`.
    pub fn element_at(&self, point: Point) -> Option<&Element> {
        self.by_stacking_order()
            .into_iter()
            .rev()
            .find(|e| e.contains(point))
    }

    /// Union of all element bounds.
    pub fn bounds(&self) -> Option<Rect> {
        union_bounds(self.elements.values())
    }

    /// Raise an element above everything else.
    pub fn bring_to_front(&mut self, id: &ElementId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let z_index = self.next_stacking_order();
        self.update(id, &ElementPatch::z_index(z_index))
    }

    /// Lower an element below everything else, never under 1.
    pub fn send_to_back(&mut self, id: &ElementId) -> bool {
        let Some(min) = self.elements.values().map(|e| e.z_index).min() else {
            return false;
        };
        if !self.contains(id) {
            return false;
        }
        self.update(id, &ElementPatch::z_index((min - 1).max(1)))
    }
}
