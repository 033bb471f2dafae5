// src/repository/mod.rs

//! Content retrieval
//!
//! Manifests, fullfiles and packs all come from the same content base: an
//! HTTPS server in production, or a local mirror directory for image
//! builds and tests. Retries with backoff apply only to remote fetches;
//! everything else fails on first occurrence.

mod client;
mod packs;

pub use client::{ContentSource, MAX_TRIES};
pub use packs::download_subscribed_packs;

/// Probe the version server before starting a network-dependent
/// operation.
pub fn check_network(source: &ContentSource) -> bool {
    source.probe("version")
}
