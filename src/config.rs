// src/config.rs

//! Updater configuration
//!
//! A plain value struct assembled from CLI flags and passed down the call
//! graph explicitly. The updater keeps no configuration files; everything
//! it needs is either a flag or derived from the target filesystem.

use std::path::{Path, PathBuf};

/// Tracked-bundles directory, relative to the target root. The presence of
/// a file named after a bundle in this directory means the bundle is
/// installed.
pub const BUNDLES_DIR: &str = "usr/share/clear/bundles";

/// Default content server; overridden with `--url`.
pub const DEFAULT_CONTENT_URL: &str = "https://cdn.swupdate.org/update";

/// Default version server; overridden with `--versionurl`.
pub const DEFAULT_VERSION_URL: &str = "https://cdn.swupdate.org/update";

/// Default mutable state directory.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/swup";

/// Updater configuration for one operation.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Target filesystem root (usually `/`).
    pub path_prefix: PathBuf,
    /// Mutable state root: staging directories, manifest cache, lock file,
    /// rename journal.
    pub state_dir: PathBuf,
    /// Base URL for manifests, fullfiles and packs. A value starting with
    /// `/` or `file://` names a local mirror directory.
    pub content_url: String,
    /// Base URL used for the network reachability probe.
    pub version_url: String,
    /// Verify the MoM signature before trusting it.
    pub sig_check: bool,
    /// Ed25519 public key used for MoM verification.
    pub pubkey_path: Option<PathBuf>,
    /// Path prefixes never touched by install (e.g. `/usr/src/debug`).
    pub ignore_prefixes: Vec<String>,
    /// Command run under the target root after a successful install.
    pub post_update_hook: Option<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            path_prefix: PathBuf::from("/"),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            content_url: DEFAULT_CONTENT_URL.to_string(),
            version_url: DEFAULT_VERSION_URL.to_string(),
            sig_check: true,
            pubkey_path: None,
            ignore_prefixes: Vec::new(),
            post_update_hook: None,
        }
    }
}

impl UpdaterConfig {
    /// Staged content blobs, keyed by hash.
    pub fn staged_dir(&self) -> PathBuf {
        self.state_dir.join("staged")
    }

    /// Scratch space for in-flight downloads; cleared at install start.
    pub fn download_dir(&self) -> PathBuf {
        self.state_dir.join("download")
    }

    /// Reserved for delta content.
    pub fn delta_dir(&self) -> PathBuf {
        self.state_dir.join("delta")
    }

    /// Process-exclusion lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("swup.lock")
    }

    /// Rename journal written during install commit.
    pub fn journal_path(&self) -> PathBuf {
        self.state_dir.join("install.journal")
    }

    /// Cached manifest blob for `(version, component)`.
    pub fn manifest_cache(&self, version: u32, component: &str) -> PathBuf {
        self.state_dir
            .join(version.to_string())
            .join(format!("Manifest.{component}"))
    }

    /// Tracked-bundles directory under the target root.
    pub fn tracked_dir(&self) -> PathBuf {
        self.path_prefix.join(BUNDLES_DIR)
    }

    /// Marker file recording that `name` is installed.
    pub fn tracked_marker(&self, name: &str) -> PathBuf {
        self.tracked_dir().join(name)
    }

    /// Config rooted at the given target prefix (primarily for tests and
    /// image builds; production use defaults to `/`).
    pub fn with_prefix<P: AsRef<Path>>(prefix: P) -> Self {
        Self {
            path_prefix: prefix.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}
