//! # MedSync Engine
//!
//! Domain logic for synchronizing clinic nodes with a central aggregation hub.
//!
//! Independently operated clinic nodes run with intermittent connectivity and
//! periodically push local changes to the central server, then pull changes
//! that originated at other clinics. The central server never originates
//! domain data; it holds replica copies tagged with provenance.
//!
//! This crate contains only the pure rules of that exchange. It has no
//! knowledge of HTTP, databases, or clocks beyond the timestamps it is handed.
//!
//! ## Core Concepts
//!
//! ### Clinic registrations
//!
//! Each clinic node has a [`ClinicRegistration`]: identity, credential hashes,
//! a lifecycle [`ClinicStatus`], the set of collections it may synchronize,
//! and the cursors tracking its last push/pull. Only `active` registrations
//! with sync enabled may exchange data.
//!
//! ### Changes
//!
//! The wire unit is a [`SyncChange`]: a client-assigned `syncId` (used for
//! idempotency and partial-failure reporting), a collection, an operation
//! (`create`/`update`/`delete`), a document id, and an opaque JSON payload.
//!
//! ### Replicas
//!
//! The central side stores one [`Replica`] per `(collection, originalId,
//! sourceClinic)`. Replicas are never physically removed; deletes become
//! tombstones so pull semantics stay correct for clients with old cursors.
//!
//! ### Conflict detection
//!
//! When two clinics appear to describe the same real-world entity, the change
//! is parked for manual adjudication rather than applied. Detection is a
//! narrow per-collection heuristic (see [`conflict`]); resolution is never
//! automated.

pub mod change;
pub mod clinic;
pub mod collections;
pub mod conflict;
pub mod error;
pub mod replica;

// Re-export main types at crate root
pub use change::{ChangeOperation, PullChange, SyncChange};
pub use clinic::{normalize_clinic_id, ClinicRegistration, ClinicStatus, ONLINE_WINDOW_SECS};
pub use collections::{is_synced_collection, SYNCED_COLLECTIONS};
pub use conflict::{signals_for, ConflictType, IdentitySignals, NameDob};
pub use error::Error;
pub use replica::Replica;

/// Type aliases for clarity
pub type ClinicId = String;
pub type CollectionName = String;
pub type DocumentId = String;
pub type SyncId = String;
