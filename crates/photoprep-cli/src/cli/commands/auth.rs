//! Login, logout and whoami.

use anyhow::{Context, Result, bail};
use photoprep_core::auth::HandoffOutcome;
use photoprep_core::config::Config;
use photoprep_core::events::ClientEvent;
use photoprep_core::navigation::Navigation;

use super::account::credits_label;
use crate::cli::client::{Client, client_error};
use crate::credential;

/// Completes a login from the callback URL the browser landed on.
pub async fn login(config: &Config, callback: &str) -> Result<()> {
    let navigation = Navigation::parse(callback.trim())
        .with_context(|| format!("Invalid callback URL: {callback}"))?;
    if !navigation.carries_handoff() {
        bail!("Callback URL has no `session_id` fragment");
    }

    let mut client = Client::connect(config)?;
    let outcome = client.resolve_handoff(&navigation).await;
    client.drain_events();

    match outcome {
        HandoffOutcome::Authenticated(next) => {
            let Some(session) = next.session() else {
                bail!("Login did not produce a session");
            };
            client.persist_credential(session)?;
            println!(
                "Logged in as {} <{}>",
                session.identity.name, session.identity.email
            );
            println!(
                "Plan: {} ({})",
                session.plan,
                credits_label(config, session)
            );
            Ok(())
        }
        HandoffOutcome::Rejected { error, .. } => Err(client_error(&error)),
        HandoffOutcome::AlreadyClaimed => bail!("Login already in progress"),
    }
}

/// Ends the remote session (best effort) and forgets the credential.
pub async fn logout(config: &Config) -> Result<()> {
    let mut client = Client::connect(config)?;
    if !client.has_credential() {
        println!("Not logged in.");
        return Ok(());
    }

    client.account().logout().await;
    for event in client.drain_events() {
        if let ClientEvent::RequestFailed { message, .. } = event {
            eprintln!("Warning: {message}");
        }
    }

    credential::clear()?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(config: &Config, json: bool) -> Result<()> {
    let mut client = Client::connect(config)?;
    let session = client.require_session().await?;

    if json {
        let out = serde_json::to_string_pretty(&session).context("serialize session")?;
        println!("{out}");
        return Ok(());
    }

    println!("{} <{}>", session.identity.name, session.identity.email);
    println!("User:    {}", session.identity.id);
    println!("Plan:    {}", config.plan_catalog().display_name(&session.plan));
    println!("Credits: {}", credits_label(config, &session));
    Ok(())
}
