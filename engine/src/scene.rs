//! SceneStore - the in-memory scene container.
//!
//! The store owns the authoritative element sequence for this peer, including
//! tombstones. Order is meaningful (it is rendering/stacking order), so
//! elements live in a `Vec` with a derived id index for O(1) lookup.
//!
//! All single-element mutation goes through the store so the version clock is
//! bumped and a fresh nonce drawn on every change. The reconciler swaps the
//! whole scene in one step via [`SceneStore::replace_all`]; observers are
//! notified synchronously and never see a partially updated scene.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::nonce::{NonceSource, RandomNonceSource};
use crate::{ElementId, SceneVersion, Version};
use std::collections::HashMap;
use std::fmt;

/// Aggregate version of a scene: the sum of all element versions.
///
/// Any local mutation strictly increases it, which is all the broadcast
/// scheduler needs to detect "something changed since the last send".
pub fn scene_version(elements: &[Element]) -> SceneVersion {
    elements.iter().map(|e| e.version).sum()
}

/// Handle returned by [`SceneStore::subscribe`]; pass it back to
/// [`SceneStore::unsubscribe`] to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverHandle(u64);

type ObserverFn = Box<dyn FnMut(&[Element])>;

struct Observer {
    id: u64,
    callback: ObserverFn,
}

/// The authoritative element store for one peer.
pub struct SceneStore {
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
    observers: Vec<Observer>,
    next_observer: u64,
    nonces: Box<dyn NonceSource>,
}

impl fmt::Debug for SceneStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneStore")
            .field("elements", &self.elements)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SceneStore {
    /// Create an empty store with an entropy-seeded nonce source.
    pub fn new() -> Self {
        Self::with_nonce_source(Box::new(RandomNonceSource::new()))
    }

    /// Create an empty store with an injected nonce source.
    pub fn with_nonce_source(nonces: Box<dyn NonceSource>) -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::new(),
            observers: Vec::new(),
            next_observer: 0,
            nonces,
        }
    }

    /// All live (non-tombstoned) elements, in stored order.
    pub fn live(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_live())
    }

    /// Every element including tombstones, in stored order.
    pub fn all(&self) -> &[Element] {
        &self.elements
    }

    /// Get a live element by id.
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.get_including_deleted(id).filter(|e| e.is_live())
    }

    /// Get an element by id, tombstones included.
    pub fn get_including_deleted(&self, id: &str) -> Option<&Element> {
        self.index.get(id).map(|&slot| &self.elements[slot])
    }

    /// Count of live elements.
    pub fn len(&self) -> usize {
        self.live().count()
    }

    /// Check if the store has no live elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate scene version, tombstones included.
    pub fn version(&self) -> SceneVersion {
        scene_version(&self.elements)
    }

    /// Create a new element at the top of the stacking order.
    ///
    /// Ids are never reused, so creating over an existing id (tombstoned or
    /// not) is an error.
    pub fn create(&mut self, id: impl Into<ElementId>, payload: serde_json::Value) -> Result<Version> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(Error::ElementAlreadyExists(id));
        }

        let nonce = self.nonces.next_nonce();
        let element = Element::new(id.clone(), payload, nonce);
        let version = element.version;
        self.index.insert(id, self.elements.len());
        self.elements.push(element);

        self.notify();
        Ok(version)
    }

    /// Replace an element's payload, bumping version and nonce.
    pub fn update_payload(&mut self, id: &str, payload: serde_json::Value) -> Result<Version> {
        let nonce = self.nonces.next_nonce();
        let element = self.get_live_mut(id)?;
        element.set_payload(payload, nonce);
        let version = element.version;

        self.notify();
        Ok(version)
    }

    /// Soft-delete an element, leaving a tombstone.
    pub fn mark_deleted(&mut self, id: &str) -> Result<Version> {
        let nonce = self.nonces.next_nonce();
        let element = self.get_live_mut(id)?;
        element.mark_deleted(nonce);
        let version = element.version;

        self.notify();
        Ok(version)
    }

    fn get_live_mut(&mut self, id: &str) -> Result<&mut Element> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| Error::ElementNotFound(id.to_string()))?;
        let element = &mut self.elements[slot];
        if element.is_deleted {
            return Err(Error::ElementDeleted(id.to_string()));
        }
        Ok(element)
    }

    /// Atomically swap the entire scene and synchronously notify observers.
    ///
    /// This is the reconciler's single entry point into the store. The input
    /// must hold at most one element per id.
    pub fn replace_all(&mut self, elements: Vec<Element>) {
        self.index = elements
            .iter()
            .enumerate()
            .map(|(slot, e)| (e.id.clone(), slot))
            .collect();
        debug_assert_eq!(self.index.len(), elements.len(), "duplicate element id");
        self.elements = elements;

        self.notify();
    }

    /// Register an observer called synchronously after every mutation.
    ///
    /// Returns a handle for [`SceneStore::unsubscribe`].
    pub fn subscribe(&mut self, callback: impl FnMut(&[Element]) + 'static) -> ObserverHandle {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push(Observer {
            id,
            callback: Box::new(callback),
        });
        ObserverHandle(id)
    }

    /// Deregister an observer. Returns false if the handle was already gone.
    pub fn unsubscribe(&mut self, handle: ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.id != handle.0);
        self.observers.len() != before
    }

    fn notify(&mut self) {
        let elements = &self.elements;
        for observer in &mut self.observers {
            (observer.callback)(elements);
        }
    }
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}
