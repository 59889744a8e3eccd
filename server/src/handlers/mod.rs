//! Request handlers for sync and admin operations.

mod admin;
mod full_sync;
mod pull;
mod push;

pub use admin::*;
pub use full_sync::*;
pub use pull::*;
pub use push::*;
