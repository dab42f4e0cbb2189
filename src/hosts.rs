//! Host resolution
//!
//! Turns raw `[user@]hostname` tokens into fully-resolved [`Host`] records,
//! consulting an optional per-run port override and the `~/.ssh/config`
//! aliases for defaults.

use std::path::{Path, PathBuf};

use crate::error::{MsshCopyIdError, Result};
use crate::keys;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// A single remote target of the batch
#[derive(Debug, Clone)]
pub struct Host {
    /// Hostname or IP address
    pub hostname: String,
    /// SSH port (default: 22)
    pub port: u16,
    /// Username for the SSH connection
    pub user: String,
    /// Explicit password for this host, if one was given at parse time
    pub password: Option<String>,
}

impl Host {
    pub fn new(hostname: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            user: user.into(),
            password: None,
        }
    }

    /// Get the SSH connection string (user@host or user@host:port)
    pub fn connection_string(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            format!("{}@{}", self.user, self.hostname)
        } else {
            format!("{}@{}:{}", self.user, self.hostname, self.port)
        }
    }
}

/// Parse a list of host tokens into [`Host`] records, preserving order and
/// duplicates.
///
/// Each field is taken in this order of priority:
///
/// - hostname: from the token itself.
/// - user: from the token itself, else from the SSH config aliases, else the
///   current OS login.
/// - port: from `port_override`, else from the SSH config aliases, else 22.
///
/// A token containing several `@` characters splits on the first one, so
/// `a@b@c` resolves to user `a` on host `b@c`. The password, when given,
/// seeds every parsed host as an explicit per-host password.
pub fn parse_hosts(
    tokens: &[String],
    port_override: Option<u16>,
    aliases: Option<&SshConfigAliases>,
    password: Option<&str>,
) -> Result<Vec<Host>> {
    let current_user = current_user();
    let mut hosts = Vec::with_capacity(tokens.len());

    for token in tokens {
        let (user, hostname) = match token.split_once('@') {
            Some((user, hostname)) => (Some(user), hostname),
            None => (None, token.as_str()),
        };
        if hostname.is_empty() || user.is_some_and(str::is_empty) {
            return Err(MsshCopyIdError::HostResolution(token.clone()));
        }

        let (alias_user, alias_port) = match aliases {
            Some(aliases) => aliases.lookup(hostname),
            None => (None, None),
        };

        let user = user
            .map(str::to_owned)
            .or_else(|| alias_user.map(str::to_owned))
            .unwrap_or_else(|| current_user.clone());
        let port = port_override.or(alias_port).unwrap_or(DEFAULT_SSH_PORT);

        let mut host = Host::new(hostname, port, user);
        host.password = password.map(str::to_owned);
        hosts.push(host);
    }

    Ok(hosts)
}

/// The current OS login identity
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "root".to_owned())
}

pub fn default_ssh_config() -> PathBuf {
    keys::ssh_dir().join("config")
}

/// Host aliases read from an OpenSSH client configuration file.
///
/// Only the `Host`, `User` and `Port` keywords are interpreted; the first
/// matching block wins per field, as OpenSSH does.
#[derive(Debug, Default)]
pub struct SshConfigAliases {
    blocks: Vec<AliasBlock>,
}

#[derive(Debug, Default)]
struct AliasBlock {
    patterns: Vec<String>,
    user: Option<String>,
    port: Option<u16>,
}

impl SshConfigAliases {
    /// Load the aliases from a config file. A missing file is not an error.
    pub fn load(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!("loaded SSH configuration from [{}]", path.display());
                Some(Self::parse(&text))
            }
            Err(_) => {
                tracing::debug!("SSH config file \"{}\" not found", path.display());
                None
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut blocks: Vec<AliasBlock> = Vec::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };
            match keyword.to_ascii_lowercase().as_str() {
                "host" => blocks.push(AliasBlock {
                    patterns: words.map(str::to_owned).collect(),
                    ..Default::default()
                }),
                "user" => {
                    if let (Some(block), Some(user)) = (blocks.last_mut(), words.next()) {
                        block.user = Some(user.to_owned());
                    }
                }
                "port" => {
                    if let (Some(block), Some(port)) = (blocks.last_mut(), words.next()) {
                        block.port = port.parse().ok();
                    }
                }
                _ => {}
            }
        }
        Self { blocks }
    }

    /// Look up the default user and port for a hostname.
    pub fn lookup(&self, hostname: &str) -> (Option<&str>, Option<u16>) {
        let mut user = None;
        let mut port = None;
        for block in &self.blocks {
            if !block.patterns.iter().any(|p| pattern_matches(p, hostname)) {
                continue;
            }
            if user.is_none() {
                user = block.user.as_deref();
            }
            if port.is_none() {
                port = block.port;
            }
        }
        (user, port)
    }
}

/// OpenSSH-style pattern match: `*` matches any run, `?` a single character.
fn pattern_matches(pattern: &str, host: &str) -> bool {
    // Negated patterns never provide defaults here
    if pattern.starts_with('!') {
        return false;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let host: Vec<char> = host.chars().collect();
    matches_at(&pattern, &host)
}

fn matches_at(pattern: &[char], host: &[char]) -> bool {
    match pattern.split_first() {
        None => host.is_empty(),
        Some((&'*', rest)) => (0..=host.len()).any(|skip| matches_at(rest, &host[skip..])),
        Some((&'?', rest)) => !host.is_empty() && matches_at(rest, &host[1..]),
        Some((c, rest)) => host.first() == Some(c) && matches_at(rest, &host[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str], port: Option<u16>, aliases: Option<&SshConfigAliases>) -> Vec<Host> {
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        parse_hosts(&tokens, port, aliases, None).unwrap()
    }

    #[test]
    fn plain_hostname_resolves_to_current_user() {
        let hosts = parse(&["server1"], None, None);
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "server1");
        assert_eq!(hosts[0].port, 22);
        assert_eq!(hosts[0].user, current_user());
        assert_eq!(hosts[0].password, None);
    }

    #[test]
    fn user_at_hostname() {
        let hosts = parse(&["alice@server1"], None, None);
        assert_eq!(hosts[0].user, "alice");
        assert_eq!(hosts[0].hostname, "server1");
    }

    #[test]
    fn multiple_at_signs_split_on_first() {
        let hosts = parse(&["alice@server1@example"], None, None);
        assert_eq!(hosts[0].user, "alice");
        assert_eq!(hosts[0].hostname, "server1@example");
    }

    #[test]
    fn empty_token_list_yields_empty_batch() {
        assert!(parse(&[], None, None).is_empty());
    }

    #[test]
    fn duplicate_hostnames_are_preserved() {
        let hosts = parse(&["server1", "server1"], None, None);
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].hostname, hosts[1].hostname);
    }

    #[test]
    fn empty_hostname_is_rejected() {
        let tokens = vec!["alice@".to_string()];
        assert!(matches!(
            parse_hosts(&tokens, None, None, None),
            Err(MsshCopyIdError::HostResolution(_))
        ));
    }

    #[test]
    fn port_override_beats_alias_port() {
        let aliases = SshConfigAliases::parse("Host server1\n  Port 2022\n  User bob\n");
        let hosts = parse(&["server1"], Some(2222), Some(&aliases));
        assert_eq!(hosts[0].port, 2222);
        assert_eq!(hosts[0].user, "bob");
    }

    #[test]
    fn alias_port_beats_default() {
        let aliases = SshConfigAliases::parse("Host server1\n  Port 2022\n");
        let hosts = parse(&["server1", "server2"], None, Some(&aliases));
        assert_eq!(hosts[0].port, 2022);
        assert_eq!(hosts[1].port, 22);
    }

    #[test]
    fn explicit_user_beats_alias_user() {
        let aliases = SshConfigAliases::parse("Host server1\n  User bob\n");
        let hosts = parse(&["alice@server1"], None, Some(&aliases));
        assert_eq!(hosts[0].user, "alice");
    }

    #[test]
    fn wildcard_alias_patterns() {
        let aliases = SshConfigAliases::parse("Host *.example.com db?\n  Port 2022\n");
        let hosts = parse(&["web1.example.com", "db1", "db12"], None, Some(&aliases));
        assert_eq!(hosts[0].port, 2022);
        assert_eq!(hosts[1].port, 2022);
        assert_eq!(hosts[2].port, 22);
    }

    #[test]
    fn first_matching_block_wins() {
        let aliases =
            SshConfigAliases::parse("Host server1\n  User bob\nHost *\n  User fallback\n  Port 2022\n");
        let (user, port) = aliases.lookup("server1");
        assert_eq!(user, Some("bob"));
        assert_eq!(port, Some(2022));
    }

    #[test]
    fn password_argument_seeds_every_host() {
        let tokens = vec!["server1".to_string(), "server2".to_string()];
        let hosts = parse_hosts(&tokens, None, None, Some("secret")).unwrap();
        assert!(hosts.iter().all(|h| h.password.as_deref() == Some("secret")));
    }

    #[test]
    fn connection_string_hides_default_port() {
        assert_eq!(Host::new("server1", 22, "alice").connection_string(), "alice@server1");
        assert_eq!(
            Host::new("server1", 2022, "alice").connection_string(),
            "alice@server1:2022"
        );
    }
}
