//! MedSync Hub - central synchronization server for clinic nodes.
//!
//! Independent, intermittently-connected clinic deployments push their local
//! changes here and pull changes originated by other clinics. The hub never
//! originates domain data; it verifies clinic credentials, keeps provenance-
//! tagged replica copies, parks cross-clinic duplicates for manual review,
//! and coordinates scheduled jobs across process instances with a
//! store-backed distributed lock.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod lock;
pub mod routes;

use crate::config::Config;
use crate::db::{ClinicStore, ReplicaStore};
use crate::lock::DistributedLock;
use std::sync::Arc;

/// Application state shared across handlers.
///
/// Stores and the lock are injected here rather than reached through
/// globals, so tests can substitute the in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub clinics: Arc<dyn ClinicStore>,
    pub replicas: Arc<dyn ReplicaStore>,
    pub lock: DistributedLock,
    pub config: Arc<Config>,
}
