//! SSH client handler

use std::path::PathBuf;

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;

/// What to do when a server presents a host key that is not in the trust
/// store yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Refuse the connection
    RejectUnknown,
    /// Record the key in the trust store and continue
    AutoAddUnknown,
}

/// SSH client handler verifying server keys against the known_hosts file
pub struct SshClient {
    hostname: String,
    port: u16,
    trust_policy: TrustPolicy,
    known_hosts: PathBuf,
}

impl SshClient {
    pub fn new(hostname: &str, port: u16, trust_policy: TrustPolicy, known_hosts: PathBuf) -> Self {
        Self {
            hostname: hostname.to_owned(),
            port,
            trust_policy,
            known_hosts,
        }
    }
}

#[async_trait]
impl client::Handler for SshClient {
    type Error = russh::Error;

    /// Called when the server sends its public key for verification.
    ///
    /// Keys already present in the trust store are accepted regardless of the
    /// policy; unknown keys are learned or refused depending on it. A key
    /// that changed since it was recorded is always refused.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let known = if self.known_hosts.exists() {
            russh_keys::check_known_hosts_path(
                &self.hostname,
                self.port,
                server_public_key,
                &self.known_hosts,
            )
        } else {
            Ok(false)
        };

        match known {
            Ok(true) => Ok(true),
            Ok(false) => match self.trust_policy {
                TrustPolicy::AutoAddUnknown => {
                    if let Err(e) = russh_keys::learn_known_hosts_path(
                        &self.hostname,
                        self.port,
                        server_public_key,
                        &self.known_hosts,
                    ) {
                        tracing::warn!(
                            "[{}] could not record the host key in {}: {}",
                            self.hostname,
                            self.known_hosts.display(),
                            e
                        );
                    } else {
                        tracing::debug!(
                            "[{}] host key added to {}",
                            self.hostname,
                            self.known_hosts.display()
                        );
                    }
                    Ok(true)
                }
                TrustPolicy::RejectUnknown => {
                    tracing::warn!(
                        "[{}] host key not found in {}",
                        self.hostname,
                        self.known_hosts.display()
                    );
                    Ok(false)
                }
            },
            Err(russh_keys::Error::KeyChanged { line }) => {
                tracing::warn!(
                    "[{}] host key changed (recorded at {}:{})",
                    self.hostname,
                    self.known_hosts.display(),
                    line
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(
                    "[{}] could not read {}: {}",
                    self.hostname,
                    self.known_hosts.display(),
                    e
                );
                Ok(false)
            }
        }
    }
}
