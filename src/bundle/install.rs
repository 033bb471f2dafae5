// src/bundle/install.rs

//! Bundle installation
//!
//! Installs are two-phase: every file of the target set is staged next
//! to its final path first, and only when the whole set staged cleanly
//! does the rename pass commit. A failure during staging leaves the
//! live filesystem untouched; a failure during renames leaves a
//! partially-installed system, recorded in the rename journal and not
//! rolled back.
//!
//! The tracked-bundles marker for each new bundle is part of the
//! bundle's own file list, so renaming it into place is the canonical
//! commit point for "this bundle is installed".

use super::{add_subscriptions, init, SubscriptionOutcome};
use crate::config::UpdaterConfig;
use crate::filesystem::{self, Stager};
use crate::journal::InstallJournal;
use crate::manifest::{
    consolidate_files, files_from_bundles, recurse_manifest, FileEntry, ManifestLoader,
};
use crate::repository::{download_subscribed_packs, ContentSource};
use crate::scripts::run_scripts;
use crate::subscriptions::Subscriptions;
use crate::version::get_current_version;
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Install one or more bundles and their transitive includes.
pub fn install_bundles(config: &UpdaterConfig, names: &[String]) -> Result<()> {
    let _lock = init(config)?;

    let current_version = get_current_version(&config.path_prefix)?;

    let source = ContentSource::new(&config.content_url)?;
    let loader = ManifestLoader::new(config, &source);
    let mut mom = loader.load_mom(current_version)?;

    // Step 1: validate the requested names and build the subscription
    // set for everything new
    let mut subs = Subscriptions::new();
    match add_subscriptions(config, &mut subs, &loader, names, &mom) {
        Ok(SubscriptionOutcome::Added) => {}
        Ok(SubscriptionOutcome::NoNew) => {
            info!("Bundle(s) already installed, nothing to do");
            return Err(Error::BundleInstall(
                "requested bundle(s) are already installed".to_string(),
            ));
        }
        Err(e) => {
            warn!("Cannot resolve requested bundles: {}", e);
            return Err(Error::BundleInstall(format!(
                "unable to load manifests for the requested bundle(s): {e}"
            )));
        }
    }

    subs.set_versions_from_mom(&mom);
    let to_install = recurse_manifest(&subs, &loader, &mom, None)?;
    let mut to_install_files = consolidate_files(files_from_bundles(&to_install));
    info!(
        "Installing {} bundle(s), {} file(s)",
        to_install.len(),
        to_install_files.len()
    );

    // Step 2: fetch packs for everything subscribed
    filesystem::clear_dir(&config.download_dir())?;
    info!("Downloading packs...");
    download_subscribed_packs(config, &source, &subs);

    // Step 3: extend the view with the already-tracked bundles; their
    // consolidated files are the canonical source for lineage repair
    subs.append_tracked(config)?;
    subs.set_versions_from_mom(&mom);
    mom.submanifests = recurse_manifest(&subs, &loader, &mom, None)?;
    mom.files = consolidate_files(files_from_bundles(&mom.submanifests));

    // Step 4: stage everything, then commit everything
    let stager = Stager::new(config, &source);
    info!("Installing bundle(s) files...");
    for file in to_install_files.iter_mut() {
        if skip_for_install(config, file) {
            continue;
        }
        if let Err(first) = stager.do_staging(file) {
            debug!(
                "Staging {} failed ({}), repairing directory lineage",
                file.path, first
            );
            if let Err(e) = stager
                .verify_fix_path(&file.path, &mom)
                .and_then(|()| stager.do_staging(file))
            {
                return Err(Error::BundleInstall(format!(
                    "cannot stage {}: {e}",
                    file.path
                )));
            }
        }
    }

    // Every entry that survived the staging loop carries its staged
    // path; lineage repair re-runs do_staging rather than committing
    // behind the entry's back
    let mut journal = InstallJournal::begin(config, current_version, names)?;
    for file in &to_install_files {
        if skip_for_install(config, file) {
            continue;
        }
        stager
            .rename_staged_to_final(file)
            .map_err(|e| Error::BundleInstall(format!("cannot commit {}: {e}", file.path)))?;
        journal.record_rename(&file.path)?;
    }

    filesystem::sync_filesystem();
    journal.complete()?;

    // Step 5: let the OS finish up (loader caches and friends)
    run_scripts(config);

    info!("Bundle(s) installation done");
    Ok(())
}

fn skip_for_install(config: &UpdaterConfig, file: &FileEntry) -> bool {
    file.is_deleted() || file.flags.do_not_update || ignore(config, file)
}

/// Paths install never touches: runtime state owned by the OS and any
/// configured ignore prefixes.
fn ignore(config: &UpdaterConfig, file: &FileEntry) -> bool {
    if file.flags.is_state {
        return true;
    }
    config
        .ignore_prefixes
        .iter()
        .any(|prefix| file.path.starts_with(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::FileKind;

    fn entry(path: &str) -> FileEntry {
        FileEntry::new(path, &"ab".repeat(32), FileKind::File, 10)
    }

    #[test]
    fn test_skip_deleted_and_do_not_update() {
        let config = UpdaterConfig::default();

        let mut deleted = entry("/usr/bin/gone");
        deleted.flags.is_deleted = true;
        assert!(skip_for_install(&config, &deleted));

        let mut frozen = entry("/boot/loader");
        frozen.flags.do_not_update = true;
        assert!(skip_for_install(&config, &frozen));

        assert!(!skip_for_install(&config, &entry("/usr/bin/ed")));
    }

    #[test]
    fn test_ignore_state_and_prefixes() {
        let config = UpdaterConfig {
            ignore_prefixes: vec!["/usr/src/debug".to_string()],
            ..Default::default()
        };

        let mut state = entry("/var/lib/thing");
        state.flags.is_state = true;
        assert!(ignore(&config, &state));

        assert!(ignore(&config, &entry("/usr/src/debug/vmlinux")));
        assert!(!ignore(&config, &entry("/usr/bin/ed")));
    }
}
