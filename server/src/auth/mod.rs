//! Authentication: clinic credentials and the master operator secret.

mod middleware;
mod password;

pub use middleware::{ClinicAuth, MasterAuth};
pub use password::{hash_secret, verify_secret};
