//! Copy the SSH public key to every host of the batch

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use zeroize::Zeroize;

use crate::batch::{self, BatchContext};
use crate::error::{MsshCopyIdError, Result};
use crate::hosts::Host;
use crate::keys;
use crate::known_hosts::{self, SshKeygenRemover};
use crate::ssh::{CopyOutcome, SshKeyCopier, TrustPolicy};

use super::InteractivePassword;

pub struct CopyOptions {
    pub hosts: Vec<Host>,
    pub known_hosts: PathBuf,
    pub identity: Option<PathBuf>,
    pub clear: bool,
    pub no_add_host: bool,
    pub dry: bool,
    pub default_password: Option<String>,
}

/// Run the key-copy batch. Returns whether every host ended in success.
pub fn run(mut opts: CopyOptions) -> Result<bool> {
    let identity = keys::resolve_identity(opts.identity)?;
    tracing::debug!("found SSH key: {}", identity.display());

    // Both key files are fatal before any host is contacted
    let key_pair = russh_keys::load_secret_key(&identity, None).map_err(|e| {
        MsshCopyIdError::KeyMaterialInvalid {
            path: identity.clone(),
            reason: e.to_string(),
        }
    })?;
    let pub_key = keys::read_public_key(&keys::public_key_path(&identity))?;

    if opts.clear {
        known_hosts::ensure_known_hosts_file(&opts.known_hosts)?;
        known_hosts::remove_from_known_hosts(
            &opts.hosts,
            &opts.known_hosts,
            &SshKeygenRemover,
            opts.dry,
        );
    }

    let trust_policy = if opts.no_add_host {
        TrustPolicy::RejectUnknown
    } else {
        TrustPolicy::AutoAddUnknown
    };
    let copier = SshKeyCopier {
        key_pair: Arc::new(key_pair),
        pub_key,
        trust_policy,
        known_hosts: opts.known_hosts,
    };
    let mut ctx = BatchContext {
        default_password: opts.default_password,
        dry: opts.dry,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let reports = runtime.block_on(batch::copy_keys_to_hosts(
        &copier,
        &opts.hosts,
        &mut ctx,
        &mut InteractivePassword,
    ));

    if let Some(password) = ctx.default_password.as_mut() {
        password.zeroize();
    }
    for host in &mut opts.hosts {
        if let Some(password) = host.password.as_mut() {
            password.zeroize();
        }
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.outcome != CopyOutcome::Success)
        .map(|r| r.hostname.as_str())
        .collect();
    if !failed.is_empty() {
        eprintln!(
            "{} the SSH key could not be copied to {} host(s): {}",
            "Error:".red().bold(),
            failed.len(),
            failed.join(", ")
        );
    }

    Ok(failed.is_empty())
}
