//! Session-scoped caches for the Arda client.
//!
//! Nothing here outlives the process: photo payloads are spooled into
//! temporary files that are deleted when their handle is revoked, and album
//! associations are plain in-memory sets.

mod associations;
mod registry;
mod spool;

pub use associations::AssociationCache;
pub use registry::{HandleRegistry, ViewToken};
pub use spool::{LocalRef, PhotoHandle, Spool};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO Error: {0}")]
    Io(String),
    #[error("view closed before {0} handle(s) could be registered")]
    StaleView(usize),
}
