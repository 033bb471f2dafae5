// src/error.rs

//! Updater error types
//!
//! Every failure class the bundle operations can surface is a distinct
//! variant with a fixed exit code, so the CLI front end can report the
//! numeric code the rest of the OS tooling expects.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("failed updater initialization: {0}")]
    InitError(String),

    #[error("another updater holds the lock at {0}")]
    LockHeld(PathBuf),

    #[error("unable to determine current OS version: {0}")]
    CurrentVersionUnknown(String),

    #[error("unable to download/verify version {0} Manifest.MoM")]
    MomNotFound(u32),

    #[error("cannot load sub-manifest for bundle \"{0}\"")]
    RecurseManifest(String),

    #[error("bundle \"{0}\" is not a tracked bundle")]
    BundleNotTracked(String),

    #[error("cannot remove bundle: {0}")]
    BundleRemove(String),

    #[error("cannot install bundle(s): {0}")]
    BundleInstall(String),

    #[error("download failed: {0}")]
    DownloadError(String),

    #[error("network unavailable: {0}")]
    NetworkError(String),

    #[error("signature verification failed: {0}")]
    SignatureError(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl Error {
    /// Numeric exit code reported by the CLI front end.
    ///
    /// The mapping is part of the external interface and must stay stable:
    /// scripts driving the updater key off these values.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InitError(_) | Error::LockHeld(_) => 2,
            Error::CurrentVersionUnknown(_) => 3,
            Error::MomNotFound(_) => 4,
            Error::RecurseManifest(_) => 5,
            Error::BundleNotTracked(_) => 6,
            Error::BundleRemove(_) => 7,
            Error::BundleInstall(_) => 8,
            Error::DownloadError(_) | Error::NetworkError(_) => 9,
            Error::SignatureError(_) => 10,
            Error::Io(_)
            | Error::IoError(_)
            | Error::ParseError(_)
            | Error::ChecksumMismatch { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let cases: Vec<(Error, u8)> = vec![
            (Error::InitError("x".into()), 2),
            (Error::LockHeld(PathBuf::from("/tmp/l")), 2),
            (Error::CurrentVersionUnknown("x".into()), 3),
            (Error::MomNotFound(10), 4),
            (Error::RecurseManifest("editors".into()), 5),
            (Error::BundleNotTracked("editors".into()), 6),
            (Error::BundleRemove("editors".into()), 7),
            (Error::BundleInstall("editors".into()), 8),
            (Error::DownloadError("x".into()), 9),
            (Error::SignatureError("x".into()), 10),
        ];
        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "wrong code for {err}");
        }
    }

    #[test]
    fn test_generic_errors_exit_one() {
        assert_eq!(Error::ParseError("bad".into()).exit_code(), 1);
        assert_eq!(
            Error::ChecksumMismatch {
                expected: "a".into(),
                actual: "b".into()
            }
            .exit_code(),
            1
        );
    }
}
