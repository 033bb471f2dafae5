// src/manifest/mod.rs

//! Manifest data model
//!
//! A manifest describes one bundle at one OS version: the files that
//! compose it, the bundles it transitively requires, and (for the MoM,
//! the Manifest of Manifests) one pointer entry per available bundle.
//!
//! The MoM's `manifests` list and every sub-manifest's `files` list are
//! treated as immutable after load; the only fields an operation fills in
//! are `submanifests` and the consolidated `files` view of a MoM, plus
//! the transient `staging` path on file entries during install.

pub mod consolidate;
pub mod graph;
pub mod loader;
pub mod parser;

pub use consolidate::{
    consolidate_files, deduplicate_files, files_from_bundles, sort_files_by_path,
};
pub use graph::{is_included, recurse_manifest};
pub use loader::ManifestLoader;

use std::path::PathBuf;

/// Component name of the Manifest of Manifests.
pub const MOM_COMPONENT: &str = "MoM";

/// Hash value marking a deletion tombstone.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What kind of filesystem object a manifest entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Link,
    /// Pointer from a MoM to a bundle manifest
    Manifest,
}

/// Per-entry flags parsed from the manifest record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileFlags {
    pub is_deleted: bool,
    pub do_not_update: bool,
    pub is_config: bool,
    pub is_state: bool,
    pub is_boot: bool,
}

/// One path owned by a manifest.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute, normalized path. For `Manifest` pointer entries this is
    /// the bundle name instead.
    pub path: String,
    /// SHA-256 content digest, lowercase hex. All-zero for tombstones.
    pub hash: String,
    pub kind: FileKind,
    pub flags: FileFlags,
    /// OS version in which the entry last changed.
    pub last_change: u32,
    /// Absolute path of the staged copy during an install; unset otherwise.
    pub staging: Option<PathBuf>,
}

impl FileEntry {
    pub fn new(path: &str, hash: &str, kind: FileKind, last_change: u32) -> Self {
        Self {
            path: path.to_string(),
            hash: hash.to_string(),
            kind,
            flags: FileFlags::default(),
            last_change,
            staging: None,
        }
    }

    /// True when the entry marks a deleted path.
    pub fn is_deleted(&self) -> bool {
        self.flags.is_deleted || self.hash == ZERO_HASH
    }
}

/// A bundle (or MoM) at one OS version.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Bundle name; `"MoM"` for the root manifest.
    pub component: String,
    /// OS version this manifest was published in.
    pub version: u32,
    /// Files owned by the bundle. For a MoM this doubles as the
    /// consolidated view once an operation has resolved submanifests.
    pub files: Vec<FileEntry>,
    /// Bundles this bundle transitively requires.
    pub includes: Vec<String>,
    /// MoM only: one pointer entry per available bundle.
    pub manifests: Vec<FileEntry>,
    /// MoM only: loaded child manifests after resolution.
    pub submanifests: Vec<Manifest>,
}

impl Manifest {
    pub fn new(component: &str, version: u32) -> Self {
        Self {
            component: component.to_string(),
            version,
            files: Vec::new(),
            includes: Vec::new(),
            manifests: Vec::new(),
            submanifests: Vec::new(),
        }
    }

    /// Look up a bundle pointer in a MoM.
    pub fn search_bundle(&self, name: &str) -> Option<&FileEntry> {
        self.manifests.iter().find(|f| f.path == name)
    }

    /// Look up a path in this manifest's file list.
    pub fn search_file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }
}
