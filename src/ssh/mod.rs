//! SSH key-copy engine on top of russh

pub mod client;
pub mod copy;

pub use client::{SshClient, TrustPolicy};
pub use copy::{copy_key_to_host, install_command, CopyOutcome, SshKeyCopier};
