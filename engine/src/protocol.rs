//! Wire messages exchanged between peers.
//!
//! The envelope is a tagged union over the message `type`; each variant has a
//! fixed payload shape validated during decoding, before anything reaches the
//! reconciler. The receiver treats `INIT` and `UPDATE` identically - both
//! are "merge whatever batch arrives" - the distinction only matters to the
//! sender's broadcast decision.

use crate::element::Element;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// The kind of scene broadcast being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Seeds a newly joined peer; always carries the full scene.
    Init,
    /// Regular broadcast; incremental or full per the sender's decision.
    Update,
}

/// Payload shared by both message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePayload {
    /// Elements in the batch, tombstones included.
    pub elements: Vec<Element>,
}

/// A serialized-over-the-wire scene message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "UPPERCASE")]
pub enum SyncMessage {
    Init(ScenePayload),
    Update(ScenePayload),
}

impl SyncMessage {
    /// Build a message of the given kind.
    pub fn new(kind: MessageKind, elements: Vec<Element>) -> Self {
        let payload = ScenePayload { elements };
        match kind {
            MessageKind::Init => SyncMessage::Init(payload),
            MessageKind::Update => SyncMessage::Update(payload),
        }
    }

    /// The message kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            SyncMessage::Init(_) => MessageKind::Init,
            SyncMessage::Update(_) => MessageKind::Update,
        }
    }

    /// The element batch carried by the message.
    pub fn elements(&self) -> &[Element] {
        match self {
            SyncMessage::Init(payload) | SyncMessage::Update(payload) => &payload.elements,
        }
    }

    /// Serialize for the transport.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Parse and validate an inbound message.
    ///
    /// Anything that does not match the envelope shape is rejected here so
    /// the reconciliation path only ever sees well-formed batches.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::MalformedMessage(e.to_string()))
    }
}
