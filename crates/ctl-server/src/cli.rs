//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// ctldap - serves an upstream congregation database as an LDAP directory tree.
#[derive(Debug, Parser)]
#[command(name = "ctldap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "CTL_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Run one sync cycle for every site and exit.
    #[arg(long)]
    pub once: bool,
}
