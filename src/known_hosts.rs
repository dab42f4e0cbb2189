//! Known-hosts reconciliation
//!
//! Bulk-adds scanned host keys to the trust-store file and bulk-removes
//! entries for a list of hosts. Entries are opaque lines compared by exact
//! text; the file is only ever appended to (`add`) or rewritten by the
//! external removal utility (`remove`). Dry runs compute but never persist.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use colored::Colorize;

use crate::error::{MsshCopyIdError, Result};
use crate::hosts::Host;

/// Obtains candidate trust-store entries for a list of hostnames.
pub trait HostKeyScanner {
    /// Scan all hostnames in one batched call and return the
    /// newline-delimited candidate entries.
    fn scan(&self, hostnames: &[String]) -> Result<String>;
}

/// The standard `ssh-keyscan` utility.
pub struct SshKeyscan;

impl HostKeyScanner for SshKeyscan {
    fn scan(&self, hostnames: &[String]) -> Result<String> {
        tracing::debug!("running ssh-keyscan for {} host(s)", hostnames.len());
        // ssh-keyscan reports unreachable hosts on stderr and still exits 0;
        // only a failure to start the scan aborts the add.
        let output = Command::new("ssh-keyscan")
            .args(hostnames)
            .stderr(Stdio::null())
            .output()
            .map_err(|e| MsshCopyIdError::ExternalTool {
                tool: "ssh-keyscan",
                reason: e.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Removes trust-store entries addressed to one hostname.
pub trait HostKeyRemover {
    fn remove(&self, known_hosts: &Path, hostname: &str) -> Result<()>;
}

/// `ssh-keygen -f <known_hosts> -R <hostname>`
pub struct SshKeygenRemover;

impl HostKeyRemover for SshKeygenRemover {
    fn remove(&self, known_hosts: &Path, hostname: &str) -> Result<()> {
        let status = Command::new("ssh-keygen")
            .arg("-f")
            .arg(known_hosts)
            .arg("-R")
            .arg(hostname)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| MsshCopyIdError::ExternalTool {
                tool: "ssh-keygen",
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(MsshCopyIdError::ExternalTool {
                tool: "ssh-keygen",
                reason: format!("failed to remove '{hostname}' ({status})"),
            });
        }
        Ok(())
    }
}

/// Create an empty trust-store file when it does not exist yet.
pub fn ensure_known_hosts_file(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::File::create(path).map_err(|source| MsshCopyIdError::TrustStoreIo {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Add the scanned host keys of `hosts` to the trust-store file.
///
/// The current file content is read into a set of exact-text lines, the scan
/// runs once for the whole batch, and every candidate entry not already in
/// the set is staged for a single append. Candidates repeated within one
/// scan are staged once. With `dry` the file is left byte-for-byte untouched.
pub fn add_to_known_hosts(
    hosts: &[Host],
    known_hosts: &Path,
    scanner: &dyn HostKeyScanner,
    dry: bool,
) -> Result<()> {
    let current =
        std::fs::read_to_string(known_hosts).map_err(|source| MsshCopyIdError::TrustStoreIo {
            path: known_hosts.to_path_buf(),
            source,
        })?;
    let mut seen: HashSet<String> = current.lines().map(str::to_owned).collect();

    let hostnames: Vec<String> = hosts.iter().map(|h| h.hostname.clone()).collect();
    let scanned = scanner.scan(&hostnames)?;

    let mut staged: Vec<&str> = Vec::new();
    for line in scanned.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if seen.insert(line.to_owned()) {
            staged.push(line);
        }
    }

    println!(
        "{} new host key(s) to add to {}",
        staged.len().to_string().bold(),
        known_hosts.display()
    );
    if dry || staged.is_empty() {
        return Ok(());
    }

    let mut block = String::new();
    for entry in &staged {
        block.push_str(entry);
        block.push('\n');
    }
    let mut file = OpenOptions::new().append(true).open(known_hosts).map_err(|source| {
        MsshCopyIdError::TrustStoreIo {
            path: known_hosts.to_path_buf(),
            source,
        }
    })?;
    file.write_all(block.as_bytes())
        .map_err(|source| MsshCopyIdError::TrustStoreIo {
            path: known_hosts.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// Remove the trust-store entries of every host, one removal-utility call per
/// host. A failure for one host is reported and does not stop the others;
/// with `dry` the utility is never invoked.
pub fn remove_from_known_hosts(
    hosts: &[Host],
    known_hosts: &Path,
    remover: &dyn HostKeyRemover,
    dry: bool,
) {
    for host in hosts {
        println!(
            "{} Removing the host from {}...",
            format!("[{}]", host.hostname).cyan(),
            known_hosts.display()
        );
        if dry {
            continue;
        }
        if let Err(e) = remover.remove(known_hosts, &host.hostname) {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct StubScanner(String);

    impl HostKeyScanner for StubScanner {
        fn scan(&self, _hostnames: &[String]) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingScanner;

    impl HostKeyScanner for FailingScanner {
        fn scan(&self, _hostnames: &[String]) -> Result<String> {
            Err(MsshCopyIdError::ExternalTool {
                tool: "ssh-keyscan",
                reason: "No such file or directory".to_owned(),
            })
        }
    }

    struct RecordingRemover {
        calls: RefCell<Vec<String>>,
        fail: bool,
    }

    impl RecordingRemover {
        fn new(fail: bool) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl HostKeyRemover for RecordingRemover {
        fn remove(&self, _known_hosts: &Path, hostname: &str) -> Result<()> {
            self.calls.borrow_mut().push(hostname.to_owned());
            if self.fail {
                Err(MsshCopyIdError::ExternalTool {
                    tool: "ssh-keygen",
                    reason: "boom".to_owned(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn hosts(names: &[&str]) -> Vec<Host> {
        names.iter().map(|n| Host::new(*n, 22, "root")).collect()
    }

    const SERVER1_KEY: &str = "server1 ssh-rsa KRDZhqpguSRxeiqLseaD";
    const SERVER2_KEY: &str = "server2 ssh-rsa AAAAB3NzaC1yc2EAAAAB";
    const SERVER3_KEY: &str = "server3 ssh-rsa O2gDXC6h6QDXCaHo6pOH";
    const SERVER4_KEY: &str = "server4 ssh-rsa hdHWpZ8fDvQArTUFCfgU";

    fn seeded_store() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        std::fs::write(&path, format!("{SERVER1_KEY}\n{SERVER4_KEY}\n")).unwrap();
        (dir, path)
    }

    #[test]
    fn add_appends_only_missing_entries() {
        let (_dir, path) = seeded_store();
        let scanner = StubScanner(format!("{SERVER2_KEY}\n{SERVER3_KEY}\n{SERVER1_KEY}\n"));

        add_to_known_hosts(&hosts(&["server1", "server2", "server3"]), &path, &scanner, false)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!("{SERVER1_KEY}\n{SERVER4_KEY}\n{SERVER2_KEY}\n{SERVER3_KEY}\n")
        );
    }

    #[test]
    fn add_is_idempotent() {
        let (_dir, path) = seeded_store();
        let scanner = StubScanner(format!("{SERVER2_KEY}\n{SERVER3_KEY}\n"));
        let batch = hosts(&["server2", "server3"]);

        add_to_known_hosts(&batch, &path, &scanner, false).unwrap();
        let after_first = std::fs::read(&path).unwrap();
        add_to_known_hosts(&batch, &path, &scanner, false).unwrap();
        let after_second = std::fs::read(&path).unwrap();

        assert_eq!(after_first, after_second);
    }

    #[test]
    fn add_dry_run_leaves_file_byte_identical() {
        let (_dir, path) = seeded_store();
        let before = std::fs::read(&path).unwrap();
        let scanner = StubScanner(format!("{SERVER2_KEY}\n{SERVER3_KEY}\n"));

        add_to_known_hosts(&hosts(&["server2", "server3"]), &path, &scanner, true).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn duplicate_candidates_within_one_scan_stage_once() {
        let (_dir, path) = seeded_store();
        let scanner = StubScanner(format!("{SERVER2_KEY}\n{SERVER2_KEY}\n"));

        add_to_known_hosts(&hosts(&["server2"]), &path, &scanner, false).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| *l == SERVER2_KEY).count(), 1);
    }

    #[test]
    fn add_skips_blank_and_comment_lines() {
        let (_dir, path) = seeded_store();
        let scanner = StubScanner(format!("\n# server2 comment\n{SERVER2_KEY}\n\n"));

        add_to_known_hosts(&hosts(&["server2"]), &path, &scanner, false).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with(&format!("{SERVER2_KEY}\n")));
    }

    #[test]
    fn add_aborts_when_the_scan_cannot_start() {
        let (_dir, path) = seeded_store();
        let before = std::fs::read(&path).unwrap();

        let result = add_to_known_hosts(&hosts(&["server1"]), &path, &FailingScanner, false);

        assert!(matches!(result, Err(MsshCopyIdError::ExternalTool { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn add_fails_when_trust_store_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = StubScanner(String::new());
        // a directory cannot be read as a file
        let result = add_to_known_hosts(&hosts(&["server1"]), dir.path(), &scanner, false);
        assert!(matches!(result, Err(MsshCopyIdError::TrustStoreIo { .. })));
    }

    #[test]
    fn ensure_creates_missing_trust_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");

        ensure_known_hosts_file(&path).unwrap();

        assert!(path.exists());
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn ensure_leaves_existing_trust_store_alone() {
        let (_dir, path) = seeded_store();
        let before = std::fs::read(&path).unwrap();
        ensure_known_hosts_file(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn remove_invokes_the_tool_once_per_host() {
        let (_dir, path) = seeded_store();
        let remover = RecordingRemover::new(false);

        remove_from_known_hosts(&hosts(&["server1", "server2"]), &path, &remover, false);

        assert_eq!(*remover.calls.borrow(), vec!["server1", "server2"]);
    }

    #[test]
    fn remove_dry_run_never_invokes_the_tool() {
        let (_dir, path) = seeded_store();
        let remover = RecordingRemover::new(false);

        remove_from_known_hosts(&hosts(&["server1", "server2"]), &path, &remover, true);

        assert!(remover.calls.borrow().is_empty());
    }

    #[test]
    fn remove_continues_past_per_host_failures() {
        let (_dir, path) = seeded_store();
        let remover = RecordingRemover::new(true);

        remove_from_known_hosts(&hosts(&["server1", "server2", "server3"]), &path, &remover, false);

        assert_eq!(remover.calls.borrow().len(), 3);
    }
}
