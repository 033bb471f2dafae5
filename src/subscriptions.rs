// src/subscriptions.rs

//! The subscription set
//!
//! A subscription is an in-memory assertion that a bundle is (or will
//! be) tracked during the current operation. The set is ordered,
//! name-unique, owned by the running operation, and discarded when the
//! operation ends; the durable record is the tracked-bundles marker
//! directory, written only when an install commits.

use crate::config::UpdaterConfig;
use crate::manifest::Manifest;
use crate::{Error, Result};
use std::fs;
use tracing::debug;

/// One tracked (or to-be-tracked) bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub component: String,
    /// Target manifest version; 0 until filled from the MoM.
    pub version: u32,
}

/// Ordered, name-unique collection of subscriptions.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    subs: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one subscription per marker file in the tracked-bundles
    /// directory.
    pub fn load_tracked(config: &UpdaterConfig) -> Result<Self> {
        let mut subs = Self::new();
        subs.append_tracked(config)?;
        Ok(subs)
    }

    /// Append tracked bundles not already subscribed, names sorted for
    /// a deterministic traversal order.
    pub fn append_tracked(&mut self, config: &UpdaterConfig) -> Result<()> {
        let dir = config.tracked_dir();
        if !dir.is_dir() {
            debug!("No tracked-bundles directory at {:?}", dir);
            return Ok(());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        for name in names {
            self.subscribe(&name);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subs.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subs.iter().any(|s| s.component == name)
    }

    /// Append a subscription; no-op if the name is already present.
    pub fn subscribe(&mut self, name: &str) {
        if !self.contains(name) {
            self.subs.push(Subscription {
                component: name.to_string(),
                version: 0,
            });
        }
    }

    /// Remove a subscription by name.
    pub fn unsubscribe(&mut self, name: &str) -> Result<()> {
        match self.subs.iter().position(|s| s.component == name) {
            Some(idx) => {
                self.subs.remove(idx);
                Ok(())
            }
            None => Err(Error::BundleNotTracked(name.to_string())),
        }
    }

    /// Copy each subscription's target version from its MoM pointer.
    /// Bundles without a pointer keep version 0.
    pub fn set_versions_from_mom(&mut self, mom: &Manifest) {
        for sub in &mut self.subs {
            if let Some(pointer) = mom.search_bundle(&sub.component) {
                sub.version = pointer.last_change;
            }
        }
    }
}

/// Whether `name` is a tracked bundle on the target system, determined
/// solely by its marker file.
pub fn is_tracked_bundle(config: &UpdaterConfig, name: &str) -> bool {
    config.tracked_marker(name).exists()
}

/// Remove the tracked-bundles marker for `name`; missing markers are
/// fine (the bundle's own file list usually carries the marker and the
/// removal walk already unlinked it).
pub fn rm_tracking_file(config: &UpdaterConfig, name: &str) -> Result<()> {
    let marker = config.tracked_marker(name);
    match fs::remove_file(&marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
