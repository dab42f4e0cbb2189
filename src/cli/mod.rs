//! CLI command implementations

pub mod copy;
pub mod known_hosts;

use std::io::{self, BufRead, IsTerminal};

use crate::batch::PasswordSource;

/// Get a password either from a piped standard input or by prompting.
///
/// A piped stdin line (trimmed) is always preferred. With `from_stdin_only`
/// an interactive terminal yields no password instead of a prompt.
pub fn get_password(from_stdin_only: bool) -> Option<String> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut line = String::new();
        stdin.lock().read_line(&mut line).ok()?;
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_owned())
        }
    } else if !from_stdin_only {
        rpassword::prompt_password("Enter the password: ").ok()
    } else {
        None
    }
}

/// The interactive password source used by the batch retry step
pub struct InteractivePassword;

impl PasswordSource for InteractivePassword {
    fn read_password(&mut self) -> Option<String> {
        get_password(false)
    }
}
