use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Caching proxy for a token-authenticated content API.
#[derive(Debug, Parser)]
#[command(name = "presscache", version, about)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true, env = "PRESSCACHE_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP proxy (default)
    Serve,
    /// Log in interactively and print a bearer token
    Token(TokenArgs),
}

#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Username to log in as; prompted for when absent
    #[arg(short, long)]
    pub username: Option<String>,

    /// Store the password in the OS keychain
    #[arg(long)]
    pub save: bool,
}
