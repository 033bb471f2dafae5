// src/bundle/mod.rs

//! Bundle operations
//!
//! The three top-level state machines: list installable bundles,
//! install bundles with their transitive includes, and remove a bundle
//! without touching content shared with bundles that stay installed.
//!
//! Every operation starts by taking the process-wide update lock and
//! preparing the staging tree; the lock handle releases on all exit
//! paths.

mod install;
mod list;
mod remove;

pub use install::install_bundles;
pub use list::list_bundles;
pub use remove::remove_bundle;

use crate::config::UpdaterConfig;
use crate::journal;
use crate::lock::UpdateLock;
use crate::manifest::{Manifest, ManifestLoader};
use crate::subscriptions::{is_tracked_bundle, Subscriptions};
use crate::Result;
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use tracing::{debug, warn};

/// The bundle every installation implicitly carries. It provides the
/// directory skeleton and must never be removed.
pub const OS_CORE_BUNDLE: &str = "os-core";

/// Result of [`add_subscriptions`] when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    /// At least one new bundle was subscribed
    Added,
    /// Everything requested is already tracked or subscribed
    NoNew,
}

/// Acquire the update lock and prepare the state directory tree.
pub(crate) fn init(config: &UpdaterConfig) -> Result<UpdateLock> {
    let lock = UpdateLock::acquire(config.lock_path())?;

    for dir in [
        config.staged_dir(),
        config.download_dir(),
        config.delta_dir(),
    ] {
        DirBuilder::new().recursive(true).mode(0o700).create(&dir)?;
    }

    if let Some(paths) = journal::incomplete_install(config)? {
        warn!(
            "A previous install was interrupted after committing {} file(s); \
             re-run the install to reach a consistent state",
            paths.len()
        );
        journal::clear(config)?;
    }

    debug!("Updater initialized at {:?}", config.state_dir);
    Ok(lock)
}

/// Subscribe the requested bundles and, recursively, their includes.
///
/// Includes are subscribed before the bundle naming them, so traversal
/// order matches dependency order. Names without a MoM pointer are
/// skipped with a warning; a pointer whose manifest cannot be loaded
/// (after the loader's retries) fails the whole call.
pub(crate) fn add_subscriptions(
    config: &UpdaterConfig,
    subs: &mut Subscriptions,
    loader: &ManifestLoader,
    names: &[String],
    mom: &Manifest,
) -> Result<SubscriptionOutcome> {
    let mut new_bundles = false;

    for name in names {
        let Some(pointer) = mom.search_bundle(name) else {
            warn!("{} bundle name is invalid, skipping it", name);
            continue;
        };

        let manifest = loader.load_sub(pointer)?;

        if !manifest.includes.is_empty()
            && add_subscriptions(config, subs, loader, &manifest.includes, mom)?
                == SubscriptionOutcome::Added
        {
            new_bundles = true;
        }

        if is_tracked_bundle(config, name) {
            debug!("{} is already tracked", name);
            continue;
        }
        if subs.contains(name) {
            continue;
        }

        subs.subscribe(name);
        new_bundles = true;
    }

    Ok(if new_bundles {
        SubscriptionOutcome::Added
    } else {
        SubscriptionOutcome::NoNew
    })
}
