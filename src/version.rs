// src/version.rs

//! Current OS version discovery
//!
//! Image-based systems record the running release in
//! `<root>/usr/lib/os-release`; the updater reads `VERSION_ID=` from
//! there. There is no fallback source: an image without a parsable
//! version must not be updated.

use crate::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

const OS_RELEASE: &str = "usr/lib/os-release";

/// Read the current OS version from the target root.
pub fn get_current_version(path_prefix: &Path) -> Result<u32> {
    let path = path_prefix.join(OS_RELEASE);
    let content = fs::read_to_string(&path).map_err(|e| {
        Error::CurrentVersionUnknown(format!("cannot read {}: {e}", path.display()))
    })?;

    for line in content.lines() {
        if let Some(value) = line.strip_prefix("VERSION_ID=") {
            let value = value.trim().trim_matches('"');
            let version = value.parse::<u32>().map_err(|_| {
                Error::CurrentVersionUnknown(format!("malformed VERSION_ID \"{value}\""))
            })?;
            debug!("Current OS version is {}", version);
            return Ok(version);
        }
    }

    Err(Error::CurrentVersionUnknown(format!(
        "no VERSION_ID in {}",
        path.display()
    )))
}
