//! Manage the known_hosts file only

use std::path::Path;

use crate::error::Result;
use crate::hosts::Host;
use crate::known_hosts::{self, SshKeygenRemover, SshKeyscan};

pub fn add(hosts: &[Host], known_hosts: &Path, dry: bool) -> Result<()> {
    known_hosts::ensure_known_hosts_file(known_hosts)?;
    known_hosts::add_to_known_hosts(hosts, known_hosts, &SshKeyscan, dry)
}

pub fn remove(hosts: &[Host], known_hosts: &Path, dry: bool) -> Result<()> {
    known_hosts::ensure_known_hosts_file(known_hosts)?;
    known_hosts::remove_from_known_hosts(hosts, known_hosts, &SshKeygenRemover, dry);
    Ok(())
}
