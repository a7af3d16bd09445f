//! Server and credential status.

use anyhow::{Result, bail};
use photoprep_core::config::Config;
use photoprep_core::remote::mask_token;

use crate::cli::client::Client;

/// Probes the server and reports whether a credential is stored.
/// Does not validate the credential.
pub async fn run(config: &Config) -> Result<()> {
    let client = Client::connect(config)?;

    println!("Server:     {}", config.effective_base_url());
    match client.remote().credential() {
        Some(token) => println!("Credential: stored ({})", mask_token(&token)),
        None => println!("Credential: none"),
    }

    match client.remote().health().await {
        Ok(health) => {
            println!("Health:     {}", health.status);
            Ok(())
        }
        Err(err) => {
            println!("Health:     unreachable");
            bail!("Server health check failed: {err}")
        }
    }
}
