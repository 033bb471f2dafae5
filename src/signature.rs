// src/signature.rs

//! Manifest signature verification
//!
//! The MoM ships with a detached Ed25519 signature. Key and signature
//! files are base64 text; verification is a pure function from bytes to
//! yes/no, with no key management beyond the single pinned public key.

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Verify `data` against a base64 detached signature using the pinned
/// public key at `pubkey_path`.
pub fn verify_detached(pubkey_path: &Path, data: &[u8], sig_text: &[u8]) -> Result<()> {
    let key = load_public_key(pubkey_path)?;

    let sig_b64 = std::str::from_utf8(sig_text)
        .map_err(|_| Error::SignatureError("signature file is not UTF-8".to_string()))?;
    let sig_bytes = BASE64
        .decode(sig_b64.trim())
        .map_err(|e| Error::SignatureError(format!("bad signature encoding: {e}")))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|e| Error::SignatureError(format!("bad signature length: {e}")))?;

    key.verify(data, &signature)
        .map_err(|e| Error::SignatureError(format!("manifest signature rejected: {e}")))?;

    debug!("Manifest signature verified with key {}", pubkey_path.display());
    Ok(())
}

fn load_public_key(path: &Path) -> Result<VerifyingKey> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::SignatureError(format!("cannot read public key {}: {e}", path.display())))?;
    let bytes = BASE64
        .decode(text.trim())
        .map_err(|e| Error::SignatureError(format!("bad public key encoding: {e}")))?;
    let raw: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::SignatureError("public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&raw)
        .map_err(|e| Error::SignatureError(format!("invalid public key: {e}")))
}
