//! # Slate Engine
//!
//! A deterministic scene synchronization engine for collaborative canvases.
//!
//! This crate provides the core logic that lets multiple peers edit a shared
//! scene of drawable elements concurrently and converge on one consistent
//! result, even when the transport delivers updates out of order, duplicated,
//! or only partially. There is no central arbiter beyond message relay.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of sockets, timers, or platform
//! - **Deterministic**: the same updates, in any order, produce the same scene
//! - **Testable**: pure logic, dependencies injected, no mocks needed
//! - **Portable**: runs anywhere Rust runs (native, WASM, embedded)
//!
//! ## Core Concepts
//!
//! ### Elements
//!
//! The unit of synchronization is the [`Element`]: a stable id, a version
//! that increases on every mutation, a random tiebreak nonce regenerated
//! alongside it, a tombstone flag for soft deletes, and an opaque JSON
//! payload (geometry, style, content) that the engine never interprets.
//!
//! ### Reconciliation
//!
//! [`reconcile`](reconcile::reconcile) merges a remote batch into the local
//! scene per element id: higher version wins, equal versions fall back to the
//! lower nonce. Every peer applies the same rule, which is what makes the
//! merge converge without coordination, vector clocks, or an operation log.
//!
//! ### Broadcast scheduling
//!
//! The [`BroadcastScheduler`] keeps a per-element ledger of versions already
//! sent and emits incremental updates containing only what peers have not
//! seen. A periodic full resync heals divergence from dropped messages.
//!
//! ### History
//!
//! [`History`] records undo/redo snapshots at commit points. Any remote merge
//! clears both stacks: there is no cross-peer undo.
//!
//! ## Quick Start
//!
//! ```rust
//! use slate_engine::{CollabSession, SessionConfig};
//! use serde_json::json;
//!
//! let mut session = CollabSession::new(SessionConfig::default());
//!
//! session
//!     .create_element("rect-1", json!({"kind": "rectangle", "w": 120, "h": 80}))
//!     .unwrap();
//!
//! let live: Vec<_> = session.store().live().collect();
//! assert_eq!(live.len(), 1);
//! assert_eq!(live[0].version, 1);
//! ```

pub mod broadcast;
pub mod element;
pub mod error;
pub mod history;
pub mod nonce;
pub mod protocol;
pub mod reconcile;
pub mod scene;
pub mod session;

// Re-export main types at crate root
pub use broadcast::{BroadcastLedger, BroadcastScheduler, DEFAULT_FULL_RESYNC_INTERVAL};
pub use element::Element;
pub use error::Error;
pub use history::{History, HistoryEntry};
pub use nonce::{NonceSource, RandomNonceSource, SequentialNonceSource};
pub use protocol::{MessageKind, ScenePayload, SyncMessage};
pub use reconcile::reconcile;
pub use scene::{scene_version, ObserverHandle, SceneStore};
pub use session::{CollabSession, SessionConfig, Transport};

/// Type aliases for clarity
pub type ElementId = String;
pub type Version = u64;
pub type VersionNonce = u64;
pub type SceneVersion = u64;
pub type Timestamp = u64;
