//! mssh-copy-id - Copy SSH public keys to multiple servers
//!
//! This crate distributes a local public key to the `authorized_keys` file
//! of a set of remote hosts and maintains the local `known_hosts` trust
//! store for them:
//! - Resolves `[user@]hostname` tokens against `~/.ssh/config` aliases
//! - Bulk-adds scanned host keys to `known_hosts`, or bulk-removes entries
//! - Copies the public key over SSH with a bounded authentication retry
//! - Never aborts the batch because of one host's failure

pub mod batch;
pub mod cli;
pub mod error;
pub mod hosts;
pub mod keys;
pub mod known_hosts;
pub mod ssh;

pub use error::{MsshCopyIdError, Result};
