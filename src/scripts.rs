// src/scripts.rs

//! Post-install scripts
//!
//! After an install commits and the filesystem is synced, the
//! configured hook runs once with the target root in its environment
//! (loader cache rebuilds, trigger daemons, and similar). The hook is
//! opaque to the updater: a failing hook is reported but never fails
//! the install, which has already committed.

use crate::config::UpdaterConfig;
use std::process::Command;
use tracing::{debug, info, warn};

/// Run the post-update hook, if one is configured.
pub fn run_scripts(config: &UpdaterConfig) {
    let hook = match &config.post_update_hook {
        Some(h) => h,
        None => {
            debug!("No post-update hook configured");
            return;
        }
    };

    info!("Running post-update hook");
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(hook)
        .env("SWUP_ROOT", &config.path_prefix)
        .status();

    match status {
        Ok(status) if status.success() => debug!("Post-update hook finished"),
        Ok(status) => warn!("Post-update hook exited with {}", status),
        Err(e) => warn!("Post-update hook failed to start: {}", e),
    }
}
