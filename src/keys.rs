//! Local key material
//!
//! Locates the SSH identity to copy and reads the matching public key. Both
//! files are treated as opaque text; a missing key is fatal before any host
//! is contacted.

use std::path::{Path, PathBuf};

use crate::error::{MsshCopyIdError, Result};

pub fn ssh_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".ssh")
}

pub fn default_known_hosts() -> PathBuf {
    ssh_dir().join("known_hosts")
}

/// Resolve the identity file to use: the explicit `-i` argument if given,
/// else `~/.ssh/id_rsa`, else `~/.ssh/id_ed25519`.
pub fn resolve_identity(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => {
            if path.exists() {
                Ok(path)
            } else {
                Err(MsshCopyIdError::KeyMaterialMissing(path))
            }
        }
        None => {
            let rsa = ssh_dir().join("id_rsa");
            let ed25519 = ssh_dir().join("id_ed25519");
            if rsa.exists() {
                Ok(rsa)
            } else if ed25519.exists() {
                Ok(ed25519)
            } else {
                Err(MsshCopyIdError::NoDefaultKey(rsa, ed25519))
            }
        }
    }
}

/// The public key path for an identity file: `<identity>.pub`
pub fn public_key_path(identity: &Path) -> PathBuf {
    let mut path = identity.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// Read the public key content: the first line of the file, trimmed.
pub fn read_public_key(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            MsshCopyIdError::KeyMaterialMissing(path.to_path_buf())
        } else {
            MsshCopyIdError::KeyMaterialUnreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let key = content.lines().next().unwrap_or("").trim();
    if key.is_empty() {
        return Err(MsshCopyIdError::KeyMaterialMissing(path.to_path_buf()));
    }
    Ok(key.to_owned())
}
