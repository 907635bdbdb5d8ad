//! Filesystem primitives for unisonctrl
//!
//! Everything that touches the disk on behalf of the controller lives here:
//! atomic record writes, the advisory lock serializing reconciliation passes,
//! path sanitizing, SHA-256 digests, and format-agnostic config loading.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod lock;
pub mod path;

pub use checksum::Digest;
pub use config::ConfigStore;
pub use error::{Error, Result};
pub use lock::PassLock;
pub use path::{relative_to, sanitize_path};
