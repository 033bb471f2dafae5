// src/manifest/parser.rs

//! Manifest wire-format parser
//!
//! Manifests are tab-separated text. A header block of `key:\tvalue`
//! lines follows the `MANIFEST\t<format>` magic, a blank line ends the
//! header, and every remaining line is one file record:
//!
//! ```text
//! MANIFEST\t1
//! version:\t1880
//! previous:\t1870
//! filecount:\t2
//! timestamp:\t1690000000
//! contentsize:\t0
//! includes:\tos-core
//!
//! F...\t<64 hex>\t1880\t/usr/bin/ed
//! D...\t<64 hex>\t1880\t/usr/bin
//! ```
//!
//! Record flags are four characters:
//! - `[0]` kind: `F` file, `D` directory, `L` symlink, `M` manifest pointer
//! - `[1]` status: `.` present, `d` deleted, `g` ghosted (also deleted)
//! - `[2]` class: `C` config, `s` state, `b` boot, `.` none
//! - `[3]` policy: `u` do-not-update, `.` none

use crate::manifest::{FileEntry, FileFlags, FileKind, Manifest};
use crate::{Error, Result};

/// Manifest format revision this parser understands.
pub const MANIFEST_FORMAT: u32 = 1;

/// Parse manifest text for the named component.
///
/// MoM pointer records (`M` kind) land in `manifests`; everything else
/// lands in `files`. Pointer paths are bundle names, not absolute paths.
pub fn parse(component: &str, input: &str) -> Result<Manifest> {
    let mut lines = input.lines();

    let magic = lines
        .next()
        .ok_or_else(|| Error::ParseError("empty manifest".to_string()))?;
    let format = magic
        .strip_prefix("MANIFEST\t")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| Error::ParseError(format!("bad manifest magic \"{magic}\"")))?;
    if format > MANIFEST_FORMAT {
        return Err(Error::ParseError(format!(
            "unsupported manifest format {format}"
        )));
    }

    let mut manifest = Manifest::new(component, 0);

    // Header block
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(":\t")
            .ok_or_else(|| Error::ParseError(format!("bad header line \"{line}\"")))?;
        match key {
            "version" => {
                manifest.version = value
                    .parse()
                    .map_err(|_| Error::ParseError(format!("bad version \"{value}\"")))?;
            }
            "includes" => manifest.includes.push(value.to_string()),
            // previous, filecount, timestamp, contentsize are informational
            _ => {}
        }
    }

    if manifest.version == 0 {
        return Err(Error::ParseError(format!(
            "manifest for {component} carries no version"
        )));
    }

    // File records
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let entry = parse_record(line)?;
        match entry.kind {
            FileKind::Manifest => manifest.manifests.push(entry),
            _ => manifest.files.push(entry),
        }
    }

    Ok(manifest)
}

fn parse_record(line: &str) -> Result<FileEntry> {
    let mut fields = line.splitn(4, '\t');
    let (flags, hash, version, path) = match (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) {
        (Some(f), Some(h), Some(v), Some(p)) => (f, h, v, p),
        _ => {
            return Err(Error::ParseError(format!(
                "file record needs 4 fields: \"{line}\""
            )))
        }
    };

    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::ParseError(format!(
            "bad hash \"{hash}\" for \"{path}\""
        )));
    }

    let last_change = version
        .parse::<u32>()
        .map_err(|_| Error::ParseError(format!("bad version \"{version}\" for \"{path}\"")))?;

    let flag_chars: Vec<char> = flags.chars().collect();
    if flag_chars.len() != 4 {
        return Err(Error::ParseError(format!(
            "bad flags \"{flags}\" for \"{path}\""
        )));
    }

    let kind = match flag_chars[0] {
        'F' => FileKind::File,
        'D' => FileKind::Directory,
        'L' => FileKind::Link,
        'M' => FileKind::Manifest,
        c => return Err(Error::ParseError(format!("unknown file type '{c}'"))),
    };

    let mut entry_flags = FileFlags {
        is_deleted: matches!(flag_chars[1], 'd' | 'g'),
        do_not_update: flag_chars[3] == 'u',
        ..Default::default()
    };
    match flag_chars[2] {
        'C' => entry_flags.is_config = true,
        's' => entry_flags.is_state = true,
        'b' => entry_flags.is_boot = true,
        _ => {}
    }

    Ok(FileEntry {
        path: path.to_string(),
        hash: hash.to_ascii_lowercase(),
        kind,
        flags: entry_flags,
        last_change,
        staging: None,
    })
}
