//! Broadcast scheduling - deciding what to send after a local change.
//!
//! Incremental broadcasts send only the elements peers have not seen yet, per
//! the ledger of versions already sent. Periodically the whole scene goes out
//! anyway to make sure no one diverges due to a dropped message (relay goes
//! down etc.); that full resync is the system's designed recovery mechanism
//! and subsumes ad hoc retries.
//!
//! The ledger is advisory only: it minimizes traffic, it is never consulted
//! for merge correctness. A stale or over-eager broadcast is harmless because
//! the receiving reconciler is idempotent and version-aware.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::protocol::{MessageKind, SyncMessage};
use crate::scene::scene_version;
use crate::{ElementId, SceneVersion, Timestamp, Version};
use std::collections::HashMap;
use std::time::Duration;

/// Default interval between unconditional full-scene resyncs.
pub const DEFAULT_FULL_RESYNC_INTERVAL: Duration = Duration::from_millis(20_000);

/// The highest version already sent to peers, per element id.
#[derive(Debug, Clone, Default)]
pub struct BroadcastLedger {
    sent: HashMap<ElementId, Version>,
}

impl BroadcastLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether an element has changed since it was last sent.
    pub fn needs_send(&self, element: &Element) -> bool {
        match self.sent.get(&element.id) {
            None => true,
            Some(sent) => element.version > *sent,
        }
    }

    /// Record an element as sent. Entries only move forward.
    pub fn mark_sent(&mut self, element: &Element) {
        let entry = self.sent.entry(element.id.clone()).or_insert(0);
        *entry = (*entry).max(element.version);
    }

    /// The recorded version for an id, if any.
    pub fn sent_version(&self, id: &str) -> Option<Version> {
        self.sent.get(id).copied()
    }

    /// Forget everything. Used when a connection closes.
    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

/// Decides, after each local change, what must go out to peers.
#[derive(Debug)]
pub struct BroadcastScheduler {
    ledger: BroadcastLedger,
    /// Aggregate scene version last broadcast or received; a local change is
    /// only worth broadcasting once the aggregate moves past this watermark.
    last_broadcast_or_received: Option<SceneVersion>,
    next_full_resync_at: Option<Timestamp>,
    full_resync_interval: Duration,
}

impl BroadcastScheduler {
    /// Create a scheduler with the given full-resync interval.
    pub fn new(full_resync_interval: Duration) -> Self {
        Self {
            ledger: BroadcastLedger::new(),
            last_broadcast_or_received: None,
            next_full_resync_at: None,
            full_resync_interval,
        }
    }

    /// The ledger of versions already sent.
    pub fn ledger(&self) -> &BroadcastLedger {
        &self.ledger
    }

    /// The aggregate version watermark, if any broadcast or merge happened.
    pub fn watermark(&self) -> Option<SceneVersion> {
        self.last_broadcast_or_received
    }

    /// Build a broadcast of `kind` from the full element set.
    ///
    /// With `sync_all` false, only elements whose version exceeds their
    /// ledger entry (or with no entry) are included. `INIT` messages must
    /// always sync the full scene; requesting otherwise is a precondition
    /// violation.
    pub fn plan(
        &mut self,
        kind: MessageKind,
        elements: &[Element],
        sync_all: bool,
    ) -> Result<SyncMessage> {
        if kind == MessageKind::Init && !sync_all {
            return Err(Error::InitRequiresFullSync);
        }

        let selected: Vec<Element> = if sync_all {
            elements.to_vec()
        } else {
            elements
                .iter()
                .filter(|e| self.ledger.needs_send(e))
                .cloned()
                .collect()
        };

        let current = scene_version(elements);
        self.last_broadcast_or_received = Some(
            self.last_broadcast_or_received
                .map_or(current, |v| v.max(current)),
        );
        for element in &selected {
            self.ledger.mark_sent(element);
        }

        Ok(SyncMessage::new(kind, selected))
    }

    /// Incremental broadcast after a local mutation, if anything changed.
    ///
    /// Returns `None` when the aggregate scene version has not advanced past
    /// the watermark - nothing new to tell peers about.
    pub fn on_local_change(
        &mut self,
        elements: &[Element],
        _now: Timestamp,
    ) -> Result<Option<SyncMessage>> {
        let current = scene_version(elements);
        let advanced = self
            .last_broadcast_or_received
            .map_or(true, |watermark| current > watermark);
        if !advanced {
            return Ok(None);
        }

        Ok(Some(self.plan(MessageKind::Update, elements, false)?))
    }

    /// Unconditional full-scene resync on a fixed timer.
    ///
    /// Fires independently of whether anything changed; the first call arms
    /// the timer. Sends the entire element set regardless of ledger state.
    pub fn maybe_full_resync(
        &mut self,
        elements: &[Element],
        now: Timestamp,
    ) -> Result<Option<SyncMessage>> {
        let interval = self.full_resync_interval.as_millis() as Timestamp;
        match self.next_full_resync_at {
            None => {
                self.next_full_resync_at = Some(now + interval);
                Ok(None)
            }
            Some(due) if now >= due => {
                self.next_full_resync_at = Some(now + interval);
                Ok(Some(self.plan(MessageKind::Update, elements, true)?))
            }
            Some(_) => Ok(None),
        }
    }

    /// Full-scene `INIT` broadcast for a newly joined peer.
    pub fn init_broadcast(&mut self, elements: &[Element]) -> Result<SyncMessage> {
        self.plan(MessageKind::Init, elements, true)
    }

    /// Raise the watermark after merging a remote batch.
    ///
    /// Prevents echoing a scene right back at the peers it just came from.
    pub fn note_received(&mut self, version: SceneVersion) {
        self.last_broadcast_or_received = Some(
            self.last_broadcast_or_received
                .map_or(version, |v| v.max(version)),
        );
    }

    /// Drop all send-side state. A reopened connection resends everything.
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.last_broadcast_or_received = None;
        self.next_full_resync_at = None;
    }
}

impl Default for BroadcastScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FULL_RESYNC_INTERVAL)
    }
}
