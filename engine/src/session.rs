//! CollabSession - one peer's view of a collaborative scene.
//!
//! The session wires the store, scheduler, and history together behind a
//! single API and talks to the outside world through the [`Transport`] trait.
//! The engine never opens sockets or reads clocks itself; the embedding
//! application pumps time in as millisecond timestamps and supplies whatever
//! transport it has (WebSocket, channel, loopback in tests).

use crate::broadcast::{BroadcastScheduler, DEFAULT_FULL_RESYNC_INTERVAL};
use crate::element::Element;
use crate::error::Result;
use crate::history::{History, HistoryEntry};
use crate::nonce::NonceSource;
use crate::protocol::SyncMessage;
use crate::reconcile::reconcile;
use crate::scene::{scene_version, SceneStore};
use crate::{ElementId, Timestamp, Version};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Outbound side of whatever connection the application maintains.
///
/// When the connection is closed the session silently skips sends; local
/// editing continues and the periodic full resync repairs peers once the
/// transport reopens.
pub trait Transport {
    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Send an encoded message to all peers. Only called while open.
    fn send(&mut self, message: &SyncMessage);
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between unconditional full-scene broadcasts.
    pub full_resync_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            full_resync_interval: DEFAULT_FULL_RESYNC_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Override the full-resync interval.
    pub fn with_full_resync_interval(mut self, interval: Duration) -> Self {
        self.full_resync_interval = interval;
        self
    }
}

/// One peer's collaborative editing session.
pub struct CollabSession {
    store: SceneStore,
    scheduler: BroadcastScheduler,
    history: History,
    /// Ids under an in-progress local edit (drag, resize); shielded from
    /// remote overwrite until the edit ends.
    active_edits: HashSet<ElementId>,
}

impl CollabSession {
    /// Create a session with an entropy-seeded nonce source.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            store: SceneStore::new(),
            scheduler: BroadcastScheduler::new(config.full_resync_interval),
            history: History::new(),
            active_edits: HashSet::new(),
        }
    }

    /// Create a session with an injected nonce source (deterministic tests).
    pub fn with_nonce_source(config: SessionConfig, nonces: Box<dyn NonceSource>) -> Self {
        Self {
            store: SceneStore::with_nonce_source(nonces),
            scheduler: BroadcastScheduler::new(config.full_resync_interval),
            history: History::new(),
            active_edits: HashSet::new(),
        }
    }

    /// The underlying element store.
    pub fn store(&self) -> &SceneStore {
        &self.store
    }

    /// Mutable access to the store for direct scene manipulation.
    pub fn store_mut(&mut self) -> &mut SceneStore {
        &mut self.store
    }

    /// The broadcast scheduler.
    pub fn scheduler(&self) -> &BroadcastScheduler {
        &self.scheduler
    }

    /// The undo/redo history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Create an element locally.
    pub fn create_element(
        &mut self,
        id: impl Into<ElementId>,
        payload: serde_json::Value,
    ) -> Result<Version> {
        self.store.create(id, payload)
    }

    /// Update an element's payload locally.
    pub fn update_element(&mut self, id: &str, payload: serde_json::Value) -> Result<Version> {
        self.store.update_payload(id, payload)
    }

    /// Tombstone an element locally.
    pub fn delete_element(&mut self, id: &str) -> Result<Version> {
        self.store.mark_deleted(id)
    }

    /// Mark an element as under an in-progress edit.
    ///
    /// While marked, remote updates to that id are discarded by
    /// reconciliation so the gesture is never yanked out from under the user.
    pub fn begin_edit(&mut self, id: impl Into<ElementId>) {
        self.active_edits.insert(id.into());
    }

    /// End an in-progress edit, re-admitting the id to remote updates.
    pub fn end_edit(&mut self, id: &str) {
        self.active_edits.remove(id);
    }

    /// Flush pending broadcasts through the transport.
    ///
    /// Emits an incremental update if the scene changed since the last send,
    /// and a full resync when the periodic timer elapses. With the transport
    /// closed this is a silent no-op; nothing is buffered, the next resync
    /// after reopening carries the full scene anyway.
    pub fn sync(&mut self, transport: &mut dyn Transport, now: Timestamp) -> Result<()> {
        if !transport.is_open() {
            return Ok(());
        }

        if let Some(message) = self.scheduler.on_local_change(self.store.all(), now)? {
            debug!(elements = message.elements().len(), "incremental broadcast");
            transport.send(&message);
        }
        if let Some(message) = self.scheduler.maybe_full_resync(self.store.all(), now)? {
            debug!(elements = message.elements().len(), "full resync broadcast");
            transport.send(&message);
        }

        Ok(())
    }

    /// Handle a raw inbound message.
    ///
    /// Malformed input is logged and dropped without touching any state.
    pub fn handle_message(&mut self, raw: &str) {
        match SyncMessage::decode(raw) {
            Ok(message) => self.apply_remote(message.elements()),
            Err(error) => {
                warn!(%error, "dropping malformed message");
            }
        }
    }

    /// Merge a decoded remote batch into the local scene.
    pub fn apply_remote(&mut self, remote: &[Element]) {
        let merged = reconcile(self.store.all(), remote, &self.active_edits);

        // Raise the watermark before the swap: the post-merge scene must not
        // read as "changed locally" and be echoed back at its senders.
        self.scheduler.note_received(scene_version(&merged));
        self.store.replace_all(merged);

        // pre-merge snapshots would resurrect overwritten remote state
        self.history.clear();
    }

    /// Seed a newly joined peer with the full scene.
    pub fn handle_peer_joined(&mut self, transport: &mut dyn Transport) -> Result<()> {
        if !transport.is_open() {
            return Ok(());
        }
        let message = self.scheduler.init_broadcast(self.store.all())?;
        transport.send(&message);
        Ok(())
    }

    /// Arm history recording for the next commit point.
    pub fn resume_recording(&mut self) {
        self.history.resume_recording();
    }

    /// Snapshot the current scene into history, if recording is armed.
    pub fn record(&mut self, app_state: serde_json::Value) {
        self.history.record(HistoryEntry {
            app_state,
            elements: self.store.all().to_vec(),
        });
    }

    /// Undo to the previous snapshot; returns its app state if one existed.
    pub fn undo(&mut self, app_state: serde_json::Value) -> Option<serde_json::Value> {
        let current = HistoryEntry {
            app_state,
            elements: self.store.all().to_vec(),
        };
        let entry = self.history.undo(current)?;
        self.store.replace_all(entry.elements);
        Some(entry.app_state)
    }

    /// Redo a previously undone snapshot; returns its app state.
    pub fn redo(&mut self, app_state: serde_json::Value) -> Option<serde_json::Value> {
        let current = HistoryEntry {
            app_state,
            elements: self.store.all().to_vec(),
        };
        let entry = self.history.redo(current)?;
        self.store.replace_all(entry.elements);
        Some(entry.app_state)
    }

    /// Note that the connection closed, dropping all send-side state.
    ///
    /// Everything is resent from scratch when the connection reopens.
    pub fn close(&mut self) {
        self.scheduler.reset();
    }
}
