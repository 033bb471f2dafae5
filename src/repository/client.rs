// src/repository/client.rs

//! Content source with retry support
//!
//! Wraps a blocking HTTP client for the common case and a plain
//! directory copy for local mirrors (`--url /srv/mirror` or
//! `file:///srv/mirror`). Downloads are written to a temporary path and
//! renamed into place so a partial fetch never masquerades as a
//! complete blob.

use crate::{Error, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request timeout for a single HTTP attempt.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum fetch attempts against a remote content base.
pub const MAX_TRIES: u32 = 3;

/// Base retry delay in seconds; doubles between attempts.
const RETRY_BASE_SECS: u64 = 10;

/// Maximum uniform random jitter added to each retry delay, in seconds.
const RETRY_JITTER_SECS: f32 = 3.0;

/// Delay before retry number `attempt` (0-based): exponential backoff
/// plus a small uniform jitter so a fleet of clients does not stampede
/// the server in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let base = Duration::from_secs(RETRY_BASE_SECS << attempt);
    let jitter = Duration::from_secs_f32(rand::random::<f32>() * RETRY_JITTER_SECS);
    base + jitter
}

enum ContentBase {
    Remote(String),
    Local(PathBuf),
}

/// One content base (manifests, fullfiles, packs) with retry support.
pub struct ContentSource {
    base: ContentBase,
    client: Option<Client>,
}

impl ContentSource {
    /// Create a source for the given base URL or local mirror path.
    pub fn new(url: &str) -> Result<Self> {
        if let Some(path) = url.strip_prefix("file://") {
            debug!("Using local content mirror at {}", path);
            return Ok(Self {
                base: ContentBase::Local(PathBuf::from(path)),
                client: None,
            });
        }
        if url.starts_with('/') {
            debug!("Using local content mirror at {}", url);
            return Ok(Self {
                base: ContentBase::Local(PathBuf::from(url)),
                client: None,
            });
        }

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base: ContentBase::Remote(url.trim_end_matches('/').to_string()),
            client: Some(client),
        })
    }

    /// True when the base is a local mirror directory.
    pub fn is_local(&self) -> bool {
        matches!(self.base, ContentBase::Local(_))
    }

    /// Fetch `rel` under the content base into `dest`.
    ///
    /// Remote fetches retry up to [`MAX_TRIES`] times with exponential
    /// backoff; local copies fail immediately.
    pub fn fetch_to(&self, rel: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("failed to create directory {}: {e}", parent.display()))
            })?;
        }

        match &self.base {
            ContentBase::Local(dir) => self.copy_local(&dir.join(rel), dest),
            ContentBase::Remote(url) => {
                self.download_remote(&format!("{url}/{rel}"), dest)
            }
        }
    }

    /// Check whether `rel` is reachable under the content base.
    pub fn probe(&self, rel: &str) -> bool {
        match &self.base {
            ContentBase::Local(dir) => dir.join(rel).exists(),
            ContentBase::Remote(url) => {
                let client = match &self.client {
                    Some(c) => c,
                    None => return false,
                };
                match client.get(format!("{url}/{rel}")).send() {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        debug!("Network probe failed: {}", e);
                        false
                    }
                }
            }
        }
    }

    fn copy_local(&self, src: &Path, dest: &Path) -> Result<()> {
        if !src.is_file() {
            return Err(Error::DownloadError(format!(
                "{} not found in local mirror",
                src.display()
            )));
        }

        let temp_path = dest.with_extension("tmp");
        fs::copy(src, &temp_path).map_err(|e| {
            Error::IoError(format!("failed to copy {}: {e}", src.display()))
        })?;
        fs::rename(&temp_path, dest)?;

        debug!("Copied {} from local mirror", src.display());
        Ok(())
    }

    fn download_remote(&self, url: &str, dest: &Path) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .expect("remote content base always carries a client");

        info!("Downloading {} to {}", url, dest.display());

        let mut attempt = 0;
        loop {
            match client.get(url).send() {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let temp_path = dest.with_extension("tmp");
                    let mut file = File::create(&temp_path).map_err(|e| {
                        Error::IoError(format!(
                            "failed to create file {}: {e}",
                            temp_path.display()
                        ))
                    })?;

                    io::copy(&mut response, &mut file).map_err(|e| {
                        Error::IoError(format!("failed to write downloaded data: {e}"))
                    })?;

                    fs::rename(&temp_path, dest).map_err(|e| {
                        Error::IoError(format!(
                            "failed to move {} to {}: {e}",
                            temp_path.display(),
                            dest.display()
                        ))
                    })?;

                    debug!("Successfully downloaded to {}", dest.display());
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_TRIES {
                        return Err(Error::DownloadError(format!(
                            "failed to download {url} after {attempt} attempts: {e}"
                        )));
                    }
                    let delay = backoff_delay(attempt - 1);
                    warn!(
                        "Download attempt {} failed: {}, retrying in {:?}...",
                        attempt, e, delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
