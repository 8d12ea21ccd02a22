//! `presscache token`: log in once by hand and print the bearer token.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use presscache_core::auth::CredentialStore;
use presscache_core::{Config, Credential, HttpClient, RemoteClient};
use tracing::info;

use crate::cli::TokenArgs;

pub async fn run(config: &Config, args: TokenArgs) -> Result<()> {
    let username = match args.username.or_else(|| config.user.clone()) {
        Some(name) if !name.is_empty() => name,
        _ => prompt("Username: ")?,
    };
    if username.is_empty() {
        bail!("a username is required");
    }

    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let credential = Credential::new(username, password);

    let client = HttpClient::new(&config.api_host, config.endpoints.clone(), &config.http)?;
    let token = client
        .request_token(&credential)
        .await
        .with_context(|| format!("Login as {} failed", credential.username))?;

    if args.save {
        CredentialStore::store(&credential.username, &credential.password)?;
        info!(user = %credential.username, "Password saved to keychain");
    }

    println!("Token (set as authKey in the config): {}", token);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("Failed to read username")?;
    Ok(line.trim().to_string())
}
