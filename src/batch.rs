//! Batch orchestration
//!
//! Drives the key-copy engine over the whole host list, applying the
//! authentication-retry protocol. One host's failure never aborts the batch;
//! outcomes are logged as they occur and collected for the exit status.

use async_trait::async_trait;
use colored::Colorize;
use zeroize::Zeroize;

use crate::hosts::Host;
use crate::ssh::CopyOutcome;

/// Run-wide mutable state of one batch.
///
/// The default password is shared by every host that has no explicit
/// password of its own; the retry step updates it in place so all
/// not-yet-processed hosts see the new value.
pub struct BatchContext {
    pub default_password: Option<String>,
    pub dry: bool,
}

/// Copies the public key to a single host.
#[async_trait]
pub trait KeyCopier: Send + Sync {
    async fn copy(&self, host: &Host, password: Option<&str>) -> CopyOutcome;
}

/// Source of interactively-obtained passwords.
pub trait PasswordSource {
    /// Blocking read of one password; `None` when none can be obtained.
    fn read_password(&mut self) -> Option<String>;
}

/// Terminal outcome for one host of the batch
#[derive(Debug)]
pub struct HostReport {
    pub hostname: String,
    pub outcome: CopyOutcome,
}

/// Copy the public key to every host, in input order.
///
/// Retry protocol on `AuthenticationFailed`:
/// - a host with an explicit password fails terminally, without a prompt;
/// - a host relying on the run-wide default (possibly absent) prompts for a
///   new password exactly once, stores it as the new default, and retries
///   this host exactly once.
///
/// Any other failure is terminal for that host. Dry runs log the intent and
/// never open a session.
pub async fn copy_keys_to_hosts(
    copier: &dyn KeyCopier,
    hosts: &[Host],
    ctx: &mut BatchContext,
    passwords: &mut dyn PasswordSource,
) -> Vec<HostReport> {
    let mut reports = Vec::with_capacity(hosts.len());

    for host in hosts {
        println!(
            "{} Copying the SSH public key to {}...",
            format!("[{}]", host.hostname).cyan(),
            host.connection_string().bold()
        );
        if ctx.dry {
            continue;
        }

        let explicit = host.password.is_some();
        let mut password = host.password.clone().or_else(|| ctx.default_password.clone());

        let mut outcome = copier.copy(host, password.as_deref()).await;

        if outcome == CopyOutcome::AuthenticationFailed && !explicit {
            if let Some(new_password) = passwords.read_password() {
                ctx.default_password = Some(new_password);
                outcome = copier.copy(host, ctx.default_password.as_deref()).await;
            }
        }

        // Wipe the per-attempt clone; the sources stay in the Host record
        // and the context.
        if let Some(password) = password.as_mut() {
            password.zeroize();
        }

        report(host, &outcome);
        reports.push(HostReport {
            hostname: host.hostname.clone(),
            outcome,
        });
    }

    reports
}

fn report(host: &Host, outcome: &CopyOutcome) {
    let tag = format!("[{}]", host.hostname).cyan();
    match outcome {
        CopyOutcome::Success => {
            println!("{} {}", tag, "SSH key installed (or already present)".green());
        }
        CopyOutcome::AuthenticationFailed => {
            eprintln!("{} {}", tag, "authentication failed".red());
        }
        CopyOutcome::ConnectionError(reason) => {
            eprintln!("{} {} {}", tag, "connection failed:".red(), reason);
        }
    }
}
