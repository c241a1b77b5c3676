//! The element — the unit of synchronization.
//!
//! Every element carries the bookkeeping that reconciliation needs: a stable
//! id, a version that only ever grows, a random tiebreak nonce regenerated on
//! each mutation, and a tombstone flag. The payload is opaque application
//! data (geometry, style, content) carried atomically with those fields.

use crate::{ElementId, Version, VersionNonce};
use serde::{Deserialize, Serialize};

/// A drawable element in the shared scene.
///
/// Deleted elements are retained as tombstones so the deletion itself can
/// propagate and converge across peers; they are never physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Unique identifier, assigned once at creation, never reused
    pub id: ElementId,
    /// Strictly increasing across the element's lifetime on the mutating peer
    pub version: Version,
    /// Random tiebreak value, regenerated on every mutation; carries no
    /// ordering meaning beyond breaking equal-version conflicts
    pub version_nonce: VersionNonce,
    /// Soft delete marker (tombstone)
    pub is_deleted: bool,
    /// Opaque application data (JSON value)
    pub payload: serde_json::Value,
}

impl Element {
    /// Create a new element at version 1 with a fresh nonce.
    pub fn new(
        id: impl Into<ElementId>,
        payload: serde_json::Value,
        nonce: VersionNonce,
    ) -> Self {
        Self {
            id: id.into(),
            version: 1,
            version_nonce: nonce,
            is_deleted: false,
            payload,
        }
    }

    /// Check if the element is live (not tombstoned).
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Replace the payload, bumping the version and regenerating the nonce.
    ///
    /// This is the only legal way to change a payload; editing `payload` in
    /// place without bumping the version breaks the convergence guarantee.
    pub fn set_payload(&mut self, payload: serde_json::Value, nonce: VersionNonce) {
        self.payload = payload;
        self.bump(nonce);
    }

    /// Tombstone the element, bumping the version and regenerating the nonce.
    pub fn mark_deleted(&mut self, nonce: VersionNonce) {
        self.is_deleted = true;
        self.bump(nonce);
    }

    fn bump(&mut self, nonce: VersionNonce) {
        self.version += 1;
        self.version_nonce = nonce;
    }
}
