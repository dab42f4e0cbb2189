//! Key-copy engine
//!
//! Connects to one host, authenticates with the private key first and the
//! password second, and runs the idempotent remote command that appends the
//! public key to `~/.ssh/authorized_keys` when it is not already there.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::Disconnect;
use russh_keys::key::KeyPair;

use crate::batch::KeyCopier;
use crate::hosts::Host;

use super::client::{SshClient, TrustPolicy};

/// Terminal state of one key-copy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The remote command was dispatched; the key is installed or was
    /// already present
    Success,
    /// Both key and password authentication were rejected
    AuthenticationFailed,
    /// Network- or protocol-level failure
    ConnectionError(String),
}

/// Bound on connect + handshake so one hung host cannot stall the batch
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Production [`KeyCopier`]: one SSH session per copy attempt.
pub struct SshKeyCopier {
    pub key_pair: Arc<KeyPair>,
    pub pub_key: String,
    pub trust_policy: TrustPolicy,
    pub known_hosts: PathBuf,
}

#[async_trait]
impl KeyCopier for SshKeyCopier {
    async fn copy(&self, host: &Host, password: Option<&str>) -> CopyOutcome {
        copy_key_to_host(
            host,
            password,
            self.key_pair.clone(),
            &self.pub_key,
            self.trust_policy,
            &self.known_hosts,
        )
        .await
    }
}

/// Copy the public key to one host.
///
/// The session is closed on every exit path before the outcome is returned.
pub async fn copy_key_to_host(
    host: &Host,
    password: Option<&str>,
    key_pair: Arc<KeyPair>,
    pub_key: &str,
    trust_policy: TrustPolicy,
    known_hosts: &Path,
) -> CopyOutcome {
    let config = Arc::new(client::Config {
        inactivity_timeout: Some(Duration::from_secs(60)),
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    });
    let handler = SshClient::new(&host.hostname, host.port, trust_policy, known_hosts.to_path_buf());
    let addr = format!("{}:{}", host.hostname, host.port);

    let mut session = match tokio::time::timeout(
        CONNECT_TIMEOUT,
        client::connect(config, addr, handler),
    )
    .await
    {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => return CopyOutcome::ConnectionError(e.to_string()),
        Err(_) => {
            return CopyOutcome::ConnectionError(format!(
                "connection timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            ))
        }
    };

    let outcome = authenticate_and_install(&mut session, host, password, key_pair, pub_key).await;

    session
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
        .ok();

    outcome
}

async fn authenticate_and_install(
    session: &mut client::Handle<SshClient>,
    host: &Host,
    password: Option<&str>,
    key_pair: Arc<KeyPair>,
    pub_key: &str,
) -> CopyOutcome {
    // Offer the private key first
    let mut authenticated = match session
        .authenticate_publickey(host.user.as_str(), key_pair)
        .await
    {
        Ok(ok) => ok,
        Err(e) => return CopyOutcome::ConnectionError(e.to_string()),
    };

    // Then the password, if one is available
    if !authenticated {
        if let Some(password) = password {
            authenticated = match session.authenticate_password(host.user.as_str(), password).await {
                Ok(ok) => ok,
                Err(e) => return CopyOutcome::ConnectionError(e.to_string()),
            };
        }
    }

    if !authenticated {
        return CopyOutcome::AuthenticationFailed;
    }

    let mut channel = match session.channel_open_session().await {
        Ok(channel) => channel,
        Err(e) => return CopyOutcome::ConnectionError(e.to_string()),
    };

    // The remote exit status is deliberately not awaited: the command is
    // idempotent and the copy is best-effort.
    let dispatched = channel.exec(true, install_command(pub_key).as_str()).await;

    channel.eof().await.ok();
    channel.close().await.ok();

    match dispatched {
        Ok(()) => CopyOutcome::Success,
        Err(e) => CopyOutcome::ConnectionError(e.to_string()),
    }
}

/// The idempotent remote command: ensure `~/.ssh` exists with mode 700, then
/// append the key only when that exact line is not already present.
pub fn install_command(pub_key: &str) -> String {
    let key = pub_key.replace('\'', r"'\''");
    format!(
        "mkdir -p ~/.ssh && chmod 700 ~/.ssh && \
k='{key}' && if ! grep -qFx \"$k\" ~/.ssh/authorized_keys; then echo \"$k\" >> ~/.ssh/authorized_keys; fi"
    )
}
