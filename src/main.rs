use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use zeroize::Zeroize;

mod batch;
mod cli;
mod error;
mod hosts;
mod keys;
mod known_hosts;
mod ssh;

use error::Result;

#[derive(Parser)]
#[command(name = "mssh-copy-id")]
#[command(version)]
#[command(about = "Copy SSH public keys to multiple servers", long_about = None)]
struct Cli {
    /// The remote hosts to copy the keys to. Syntax: [user@]hostname
    #[arg(value_name = "host", required = true)]
    hosts: Vec<String>,

    /// The known_hosts file to use. Default: ~/.ssh/known_hosts
    #[arg(short = 'k', long, value_name = "FILE")]
    known_hosts: Option<PathBuf>,

    /// Do a dry run. Do not change anything
    #[arg(short = 'n', long)]
    dry: bool,

    /// Enable verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Don't add automatically new hosts into the known_hosts file
    #[arg(short = 'A', long)]
    no_add_host: bool,

    /// Clear the hosts from the known_hosts file before copying the SSH keys
    #[arg(short = 'C', long)]
    clear: bool,

    /// The SSH identity file. Default: ~/.ssh/id_rsa or ~/.ssh/id_ed25519
    #[arg(short, long, value_name = "FILE")]
    identity: Option<PathBuf>,

    /// The SSH port for the remote hosts
    #[arg(short, long)]
    port: Option<u16>,

    /// The password to log into the remote hosts. It is NOT SECURED to set
    /// the password that way, since it stays in the shell history. The
    /// password can also be sent on the standard input
    #[arg(short = 'P', long)]
    password: Option<String>,

    /// Don't copy the SSH keys, but instead add the hosts to the known_hosts
    /// file
    #[arg(short = 'a', long, conflicts_with = "remove")]
    add: bool,

    /// Don't copy the SSH keys, but instead remove the hosts from the
    /// known_hosts file
    #[arg(short = 'R', long)]
    remove: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_log(cli.verbose);

    let start = Instant::now();
    let code = match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    };
    tracing::debug!("elapsed time: {:?}", start.elapsed());

    code
}

fn init_log(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(mut cli: Cli) -> Result<bool> {
    if cli.dry {
        println!("{}", "Dry run: nothing will be changed.".yellow());
    }

    let known_hosts = cli
        .known_hosts
        .clone()
        .unwrap_or_else(keys::default_known_hosts);
    let aliases = hosts::SshConfigAliases::load(&hosts::default_ssh_config());
    let host_list = hosts::parse_hosts(
        &cli.hosts,
        cli.port,
        aliases.as_ref(),
        cli.password.as_deref(),
    )?;

    if cli.add {
        cli::known_hosts::add(&host_list, &known_hosts, cli.dry)?;
        Ok(true)
    } else if cli.remove {
        cli::known_hosts::remove(&host_list, &known_hosts, cli.dry)?;
        Ok(true)
    } else {
        // The run-wide default password: the -P argument, else a line piped
        // on stdin. The interactive prompt only happens in the retry step.
        let default_password = cli.password.clone().or_else(|| cli::get_password(true));
        let all_copied = cli::copy::run(cli::copy::CopyOptions {
            hosts: host_list,
            known_hosts,
            identity: cli.identity.take(),
            clear: cli.clear,
            no_add_host: cli.no_add_host,
            dry: cli.dry,
            default_password,
        });
        if let Some(password) = cli.password.as_mut() {
            password.zeroize();
        }
        all_copied
    }
}
