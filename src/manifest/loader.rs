// src/manifest/loader.rs

//! Manifest fetching and caching
//!
//! Manifests are cached under `<state_dir>/<version>/Manifest.<name>`
//! and fetched from the content base on a cache miss. The MoM is
//! authenticated by its detached signature; every sub-manifest is
//! authenticated by the hash recorded in its MoM pointer entry, so a
//! poisoned cache entry is detected and refetched once before the
//! operation fails.

use crate::config::UpdaterConfig;
use crate::manifest::{parser, FileEntry, Manifest, MOM_COMPONENT};
use crate::repository::ContentSource;
use crate::{signature, Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use tracing::{debug, warn};

pub struct ManifestLoader<'a> {
    config: &'a UpdaterConfig,
    source: &'a ContentSource,
}

impl<'a> ManifestLoader<'a> {
    pub fn new(config: &'a UpdaterConfig, source: &'a ContentSource) -> Self {
        Self { config, source }
    }

    /// Load the Manifest of Manifests for `version`.
    pub fn load_mom(&self, version: u32) -> Result<Manifest> {
        let cache = self.config.manifest_cache(version, MOM_COMPONENT);

        if !cache.exists() {
            let rel = format!("{version}/Manifest.MoM");
            if let Err(e) = self.source.fetch_to(&rel, &cache) {
                warn!("Unable to fetch Manifest.MoM for {}: {}", version, e);
                return Err(Error::MomNotFound(version));
            }
        }

        let raw = fs::read(&cache)?;

        if self.config.sig_check {
            self.verify_mom_signature(version, &raw)?;
        }

        let text = std::str::from_utf8(&raw)
            .map_err(|_| Error::ParseError("Manifest.MoM is not UTF-8".to_string()))?;
        let mom = parser::parse(MOM_COMPONENT, text)?;
        debug!(
            "Loaded MoM version {} with {} bundles",
            mom.version,
            mom.manifests.len()
        );
        Ok(mom)
    }

    fn verify_mom_signature(&self, version: u32, raw: &[u8]) -> Result<()> {
        let pubkey = match &self.config.pubkey_path {
            Some(p) => p,
            None => {
                warn!("Signature checking enabled but no public key configured, skipping");
                return Ok(());
            }
        };

        let sig_cache = self
            .config
            .state_dir
            .join(version.to_string())
            .join("Manifest.MoM.sig");
        if !sig_cache.exists() {
            let rel = format!("{version}/Manifest.MoM.sig");
            self.source.fetch_to(&rel, &sig_cache).map_err(|e| {
                Error::SignatureError(format!("cannot fetch MoM signature: {e}"))
            })?;
        }
        let sig = fs::read(&sig_cache)?;

        signature::verify_detached(pubkey, raw, &sig)
    }

    /// Load the sub-manifest named by a MoM pointer entry.
    ///
    /// The manifest's digest must equal the pointer hash before any
    /// parsing happens. A stale cache entry is discarded and fetched
    /// fresh once.
    pub fn load_sub(&self, pointer: &FileEntry) -> Result<Manifest> {
        let name = &pointer.path;
        let version = pointer.last_change;
        let cache = self.config.manifest_cache(version, name);

        for refetched in [false, true] {
            if !cache.exists() {
                let rel = format!("{version}/Manifest.{name}");
                self.source.fetch_to(&rel, &cache)?;
            }

            let raw = fs::read(&cache)?;
            let actual = hex_digest(&raw);
            if actual == pointer.hash {
                let text = std::str::from_utf8(&raw).map_err(|_| {
                    Error::ParseError(format!("Manifest.{name} is not UTF-8"))
                })?;
                return parser::parse(name, text);
            }

            if refetched {
                return Err(Error::ChecksumMismatch {
                    expected: pointer.hash.clone(),
                    actual,
                });
            }

            warn!(
                "Cached manifest for {} {} fails its hash, refetching",
                name, version
            );
            fs::remove_file(&cache)?;
        }

        unreachable!("sub-manifest fetch loop always returns")
    }
}

fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
