// src/repository/packs.rs

//! Bundle pack downloads
//!
//! A pack is a gzipped tar of staged content blobs (`staged/<hash>`
//! entries) for one bundle at one version. Packs are an optimization:
//! a missing or broken pack is tolerated, and staging falls back to
//! per-file fullfile fetches.

use super::ContentSource;
use crate::config::UpdaterConfig;
use crate::subscriptions::Subscriptions;
use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use std::fs::File;
use std::path::Path;
use tar::Archive;
use tracing::{debug, info, warn};

/// Fetch and extract the pack for every subscribed bundle, best effort.
pub fn download_subscribed_packs(
    config: &UpdaterConfig,
    source: &ContentSource,
    subs: &Subscriptions,
) {
    let progress = ProgressBar::new(subs.len() as u64);

    for sub in subs.iter() {
        progress.set_message(sub.component.clone());
        if sub.version == 0 {
            debug!("No version known for {}, skipping pack", sub.component);
            progress.inc(1);
            continue;
        }

        let rel = format!("{}/pack-{}-from-0.tar.gz", sub.version, sub.component);
        let dest = config
            .download_dir()
            .join(format!("pack-{}-{}.tar.gz", sub.component, sub.version));

        match source.fetch_to(&rel, &dest) {
            Ok(()) => {
                if let Err(e) = extract_pack(&dest, &config.staged_dir()) {
                    warn!("Failed to extract pack for {}: {}", sub.component, e);
                } else {
                    info!("Extracted pack for {} {}", sub.component, sub.version);
                }
            }
            Err(e) => {
                // Fullfile fallback handles anything the pack would have
                // provided
                debug!("No pack for {} {}: {}", sub.component, sub.version, e);
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
}

/// Unpack `staged/<hash>` entries from a pack archive into the staged
/// directory. Entries with any other shape are ignored.
fn extract_pack(pack: &Path, staged_dir: &Path) -> crate::Result<()> {
    let file = File::open(pack)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        let hash = match hash_component(&path) {
            Some(h) => h,
            None => {
                debug!("Ignoring pack entry {:?}", path);
                continue;
            }
        };

        let blob = staged_dir.join(&hash);
        if blob.exists() {
            continue;
        }
        entry.unpack(&blob)?;
    }

    Ok(())
}

/// Accept only `staged/<64-hex>` entry names.
fn hash_component(path: &Path) -> Option<String> {
    let mut components = path.components();
    let dir = components.next()?.as_os_str().to_str()?;
    if dir != "staged" {
        return None;
    }
    let name = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None;
    }
    if name.len() == 64 && name.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(name.to_string())
    } else {
        None
    }
}
