//! The set of collections that participate in synchronization.
//!
//! The central server keeps one logical replica table per entry. Anything
//! else a clinic sends is rejected per change, never silently mirrored.

/// Collections the hub knows how to replicate. `medications` and `supplies`
/// are the two inventory variants.
pub const SYNCED_COLLECTIONS: &[&str] =
    &["patients", "visits", "invoices", "medications", "supplies"];

/// Check whether a collection name has a replica adapter on the hub.
pub fn is_synced_collection(name: &str) -> bool {
    SYNCED_COLLECTIONS.contains(&name)
}
