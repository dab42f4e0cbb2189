use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MsshCopyIdError>;

#[derive(Debug, Error)]
pub enum MsshCopyIdError {
    #[error("cannot resolve the host '{0}'")]
    HostResolution(String),

    #[error("cannot access the known_hosts file \"{path}\": {source}")]
    TrustStoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot find the SSH key \"{0}\"")]
    KeyMaterialMissing(PathBuf),

    #[error("cannot read the SSH key \"{path}\": {source}")]
    KeyMaterialUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot find any SSH keys \"{0}\" and \"{1}\"")]
    NoDefaultKey(PathBuf, PathBuf),

    #[error("cannot load the SSH key \"{path}\": {reason}")]
    KeyMaterialInvalid { path: PathBuf, reason: String },

    #[error("{tool}: {reason}")]
    ExternalTool { tool: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
