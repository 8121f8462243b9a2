use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// Creates `p` and any missing parents. Another worker creating the same
/// path at the same time counts as success.
pub fn ensure_dir(p: &Path) -> Result<()> {
    match std::fs::create_dir_all(p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && p.is_dir() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("create_dir_all {}", p.display())),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
